//! Import declarations of a single file.

use crate::ts::nodes;
use crate::ts::query::queries;
use crate::ts::{QueryEngine, TreeSitterError};
use std::ops::Range;
use tree_sitter::Node;

/// One `import` spec, grouped or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Import path without quotes.
    pub path: String,
    /// Explicit local name (`alias`, `_` or `.`).
    pub alias: Option<String>,
    pub spec_range: Range<usize>,
    pub path_range: Range<usize>,
    pub alias_range: Option<Range<usize>>,
    /// Index of the owning declaration in [`FileImports::decls`].
    pub decl: usize,
}

impl ImportSpec {
    /// Blank (`_`) and dot imports never qualify identifiers.
    pub fn is_qualifying(&self) -> bool {
        !matches!(self.alias.as_deref(), Some("_") | Some("."))
    }
}

/// One `import` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub range: Range<usize>,
    /// `import ( ... )` form.
    pub grouped: bool,
    /// Offset of the closing parenthesis for grouped declarations.
    pub close_paren: Option<usize>,
}

/// Import model of a file plus the anchor used when a file has none.
#[derive(Debug, Clone, Default)]
pub struct FileImports {
    pub specs: Vec<ImportSpec>,
    pub decls: Vec<ImportDecl>,
    /// End of the `package` clause.
    pub package_clause_end: usize,
}

impl FileImports {
    pub fn find(&self, path: &str) -> Option<&ImportSpec> {
        self.specs.iter().find(|s| s.path == path)
    }

    /// Specs that belong to declaration `decl`.
    pub fn specs_of(&self, decl: usize) -> impl Iterator<Item = &ImportSpec> {
        self.specs.iter().filter(move |s| s.decl == decl)
    }

    /// Offset just past the last import declaration, or past the package
    /// clause when the file imports nothing.
    pub fn end_of_imports(&self) -> usize {
        self.decls
            .iter()
            .map(|d| d.range.end)
            .max()
            .unwrap_or(self.package_clause_end)
    }
}

/// Compiled queries used to read imports; build once per load.
pub struct ImportQueries {
    all: QueryEngine,
    aliased: QueryEngine,
}

impl ImportQueries {
    pub fn new() -> Result<Self, TreeSitterError> {
        Ok(Self {
            all: QueryEngine::new(queries::IMPORT_SPECS)?,
            aliased: QueryEngine::new(queries::ALIASED_IMPORT_SPECS)?,
        })
    }

    pub fn read(&self, root: Node<'_>, source: &str) -> FileImports {
        let mut imports = FileImports::default();

        for child in nodes::named_children(root) {
            match child.kind() {
                "package_clause" => imports.package_clause_end = child.end_byte(),
                "import_declaration" => {
                    let close_paren = nodes::children(child)
                        .iter()
                        .flat_map(|c| {
                            if c.kind() == "import_spec_list" {
                                nodes::children(*c)
                            } else {
                                vec![*c]
                            }
                        })
                        .filter(|c| c.kind() == ")")
                        .map(|c| c.start_byte())
                        .last();
                    imports.decls.push(ImportDecl {
                        range: child.byte_range(),
                        grouped: close_paren.is_some(),
                        close_paren,
                    });
                }
                _ => {}
            }
        }

        let aliased = self.aliased.find_all(root, source);
        for m in self.all.find_all(root, source) {
            let (Some(spec), Some(path)) = (m.capture("spec"), m.capture("path")) else {
                continue;
            };
            let alias = aliased
                .iter()
                .find(|a| a.capture("spec").is_some_and(|s| s.byte_start == spec.byte_start))
                .and_then(|a| a.capture("alias"));
            let decl = imports
                .decls
                .iter()
                .position(|d| d.range.start <= spec.byte_start && spec.byte_end <= d.range.end)
                .unwrap_or(0);
            imports.specs.push(ImportSpec {
                path: unquote(&path.text),
                alias: alias.map(|a| a.text.clone()),
                spec_range: spec.byte_start..spec.byte_end,
                path_range: path.byte_start..path.byte_end,
                alias_range: alias.map(|a| a.byte_start..a.byte_end),
                decl,
            });
        }
        imports.specs.sort_by_key(|s| s.spec_range.start);
        imports
    }
}

fn unquote(literal: &str) -> String {
    literal.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Package name a tool would assume for `import_path` without reading it:
/// the last path element, skipping a trailing major-version element
/// (`/v2`) and dropping `.vN`, `go-` and `-go` decorations.
pub fn default_package_name(import_path: &str) -> String {
    let mut parts = import_path.rsplit('/');
    let mut last = parts.next().unwrap_or(import_path);
    if is_major_version(last) {
        if let Some(prev) = parts.next() {
            last = prev;
        }
    }
    let mut name = last;
    if let Some(idx) = name.rfind(".v") {
        if name[idx + 2..].chars().all(|c| c.is_ascii_digit()) && idx + 2 < name.len() {
            name = &name[..idx];
        }
    }
    let name = name.strip_prefix("go-").unwrap_or(name);
    let name = name.strip_suffix("-go").unwrap_or(name);
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn is_major_version(element: &str) -> bool {
    element.len() > 1
        && element.starts_with('v')
        && element[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::GoParser;

    fn read(source: &str) -> FileImports {
        let mut parser = GoParser::new().unwrap();
        let tree = parser.parse(source).unwrap();
        ImportQueries::new().unwrap().read(tree.root_node(), source)
    }

    #[test]
    fn grouped_imports() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n\t_ \"embed\"\n)\n";
        let imports = read(source);
        assert_eq!(imports.decls.len(), 1);
        assert!(imports.decls[0].grouped);
        assert_eq!(&source[imports.decls[0].close_paren.unwrap()..][..1], ")");
        let paths: Vec<_> = imports.specs.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, ["fmt", "strings", "embed"]);
        assert_eq!(imports.specs[1].alias.as_deref(), Some("str"));
        assert!(!imports.specs[2].is_qualifying());
    }

    #[test]
    fn single_import() {
        let source = "package main\n\nimport \"fmt\"\n\nfunc main() {}\n";
        let imports = read(source);
        assert_eq!(imports.decls.len(), 1);
        assert!(!imports.decls[0].grouped);
        assert_eq!(imports.end_of_imports(), source.find("\n\nfunc").unwrap());
    }

    #[test]
    fn no_imports_anchor_on_package_clause() {
        let source = "package main\n\nfunc main() {}\n";
        let imports = read(source);
        assert!(imports.specs.is_empty());
        assert_eq!(imports.end_of_imports(), "package main".len());
    }

    #[test]
    fn default_names() {
        assert_eq!(default_package_name("fmt"), "fmt");
        assert_eq!(default_package_name("net/http"), "http");
        assert_eq!(default_package_name("github.com/x/mod/v2"), "mod");
        assert_eq!(default_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_package_name("github.com/mattn/go-sqlite3"), "sqlite3");
    }
}
