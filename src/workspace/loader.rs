//! Build a [`Workspace`] from disk or from in-memory sources.

use crate::pool::with_parser;
use crate::ts::{self, TreeSitterError};
use crate::workspace::imports::ImportQueries;
use crate::workspace::symbols::{collect_symbols, SymbolKind};
use crate::workspace::{
    line_starts, DependencyGraph, FileId, Package, PackageId, SourceFile, Symbol, SymbolId,
    SymbolTable, Workspace,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk workspace: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("parser error: {0}")]
    Parse(#[from] TreeSitterError),

    #[error("no Go packages found under {0}")]
    Empty(PathBuf),
}

/// Knobs for the loader.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory names (or workspace-relative paths) to skip.
    pub exclude: Vec<String>,
    /// Parse `_test.go` files.
    pub include_tests: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            include_tests: true,
        }
    }
}

/// Load every package under `root`.
pub fn load(root: impl AsRef<Path>, options: &LoadOptions) -> Result<Workspace, LoadError> {
    let root = root.as_ref();
    let module = read_module_path(root)?;
    debug!(root = %root.display(), module = ?module, "loading workspace");

    let mut sources = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !skip_entry(entry, root, options));
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("go")
        {
            continue;
        }
        if !options.include_tests && is_test_file(path) {
            continue;
        }
        let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        sources.push((rel, source));
    }

    if sources.is_empty() {
        return Err(LoadError::Empty(root.to_path_buf()));
    }
    Workspace::build(root.to_path_buf(), module, sources)
}

fn skip_entry(entry: &walkdir::DirEntry, root: &Path, options: &LoadOptions) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || name.starts_with('_') || name == "vendor" || name == "testdata" {
        return true;
    }
    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    options
        .exclude
        .iter()
        .any(|ex| name == ex.as_str() || rel == Path::new(ex))
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_test.go"))
}

/// `module` directive of `go.mod`, if the file exists.
fn read_module_path(root: &Path) -> Result<Option<String>, LoadError> {
    let go_mod = root.join("go.mod");
    if !go_mod.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&go_mod).map_err(|source| LoadError::Io {
        path: go_mod.clone(),
        source,
    })?;
    Ok(parse_module_directive(&contents))
}

pub(crate) fn parse_module_directive(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.split("//").next()?.trim().trim_matches('"');
        (!path.is_empty()).then(|| path.to_string())
    })
}

struct ParsedFile {
    path: PathBuf,
    source: String,
    tree: tree_sitter::Tree,
    package_name: String,
    is_test: bool,
}

impl Workspace {
    /// Build a workspace from in-memory `(relative path, source)` pairs.
    pub fn from_sources(
        root: impl Into<PathBuf>,
        module: Option<&str>,
        files: &[(&str, &str)],
    ) -> Result<Workspace, LoadError> {
        let sources = files
            .iter()
            .map(|(path, src)| (PathBuf::from(path), src.to_string()))
            .collect();
        Workspace::build(root.into(), module.map(str::to_string), sources)
    }

    pub(crate) fn build(
        root: PathBuf,
        module: Option<String>,
        mut sources: Vec<(PathBuf, String)>,
    ) -> Result<Workspace, LoadError> {
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        let mut by_dir: BTreeMap<PathBuf, Vec<ParsedFile>> = BTreeMap::new();
        for (path, source) in sources {
            let tree = with_parser(|parser| parser.parse(&source))??;
            let errors = ts::parser::error_nodes(&tree);
            if let Some(first) = errors.first() {
                warn!(
                    file = %path.display(),
                    line = first.line,
                    column = first.column,
                    errors = errors.len(),
                    "file has syntax errors"
                );
            }
            let Some(package_name) =
                ts::parser::package_name(tree.root_node(), &source).map(str::to_string)
            else {
                warn!(file = %path.display(), "skipping file without package clause");
                continue;
            };
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let is_test = is_test_file(&path);
            by_dir.entry(dir).or_default().push(ParsedFile {
                path,
                source,
                tree,
                package_name,
                is_test,
            });
        }

        let queries = ImportQueries::new()?;
        let mut ws = Workspace {
            root,
            module,
            packages: Vec::new(),
            files: Vec::new(),
            symbols: Vec::new(),
            by_dir: BTreeMap::new(),
            import_to_dir: BTreeMap::new(),
            graph: DependencyGraph::new(),
        };

        for (dir, parsed) in by_dir {
            let Some(name) = majority_name(&parsed) else {
                continue;
            };
            let id = PackageId(ws.packages.len() as u32);
            let import_path = ws.import_path_for_dir(&dir);
            let mut package = Package {
                id,
                dir: dir.clone(),
                name: name.clone(),
                import_path: import_path.clone(),
                files: BTreeMap::new(),
                test_files: BTreeMap::new(),
                imports: Vec::new(),
                symbols: SymbolTable::default(),
            };

            let mut imports = BTreeSet::new();
            for file in parsed {
                let external_test = file.is_test && file.package_name == format!("{name}_test");
                if file.package_name != name && !external_test {
                    warn!(
                        file = %file.path.display(),
                        declared = %file.package_name,
                        expected = %name,
                        "skipping file with mismatched package clause"
                    );
                    continue;
                }
                let file_id = FileId(ws.files.len() as u32);
                let file_imports = queries.read(file.tree.root_node(), &file.source);
                let file_name = file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if file.is_test {
                    package.test_files.insert(file_name, file_id);
                } else {
                    imports.extend(file_imports.specs.iter().map(|s| s.path.clone()));
                    let collected =
                        collect_symbols(id, file_id, file.tree.root_node(), &file.source);
                    register_symbols(&mut ws.symbols, &mut package.symbols, collected);
                    package.files.insert(file_name, file_id);
                }

                ws.files.push(SourceFile {
                    id: file_id,
                    line_starts: line_starts(&file.source),
                    path: file.path,
                    package: id,
                    source: file.source,
                    tree: file.tree,
                    is_test: file.is_test,
                    external_test,
                    package_name: file.package_name,
                    imports: file_imports,
                });
            }

            package.imports = imports.into_iter().collect();
            ws.by_dir.insert(dir.clone(), id);
            ws.import_to_dir.insert(import_path, dir);
            ws.packages.push(package);
        }

        if ws.packages.is_empty() {
            return Err(LoadError::Empty(ws.root.clone()));
        }

        for package in &ws.packages {
            ws.graph.add_package(package.id);
        }
        let mut edges = Vec::new();
        for package in &ws.packages {
            for import in &package.imports {
                if let Some(target) = ws.package_by_import_path(import) {
                    edges.push((package.id, target));
                }
            }
        }
        for (from, to) in edges {
            ws.graph.add_edge(from, to);
        }

        info!(
            packages = ws.packages.len(),
            files = ws.files.len(),
            symbols = ws.symbols.len(),
            "workspace loaded"
        );
        Ok(ws)
    }
}

/// Declared name shared by most non-external-test files of a directory.
fn majority_name(files: &[ParsedFile]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for file in files {
        if file.is_test && file.package_name.ends_with("_test") {
            continue;
        }
        *counts.entry(file.package_name.as_str()).or_default() += 1;
    }
    if counts.is_empty() {
        // Only external tests: fall back to the stripped name.
        return files
            .first()
            .map(|f| f.package_name.trim_end_matches("_test").to_string());
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(name, _)| name.to_string())
}

fn register_symbols(arena: &mut Vec<Symbol>, table: &mut SymbolTable, collected: Vec<Symbol>) {
    for sym in collected {
        let id = SymbolId(arena.len() as u32);
        let slot = match sym.kind {
            SymbolKind::Function => Some(&mut table.functions),
            SymbolKind::Type | SymbolKind::Interface => Some(&mut table.types),
            SymbolKind::Variable => Some(&mut table.variables),
            SymbolKind::Constant => Some(&mut table.constants),
            SymbolKind::Method | SymbolKind::Field => None,
        };
        match slot {
            Some(map) => {
                if map.contains_key(&sym.name) {
                    warn!(name = %sym.name, "duplicate declaration ignored");
                    continue;
                }
                map.insert(sym.name.clone(), id);
            }
            None => {
                let owner = sym.receiver.clone().unwrap_or_default();
                let list = if sym.kind == SymbolKind::Method {
                    table.methods.entry(owner).or_default()
                } else {
                    table.fields.entry(owner).or_default()
                };
                list.push(id);
            }
        }
        arena.push(sym);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_directive() {
        assert_eq!(
            parse_module_directive("// comment\nmodule example.com/app // x\n\ngo 1.22\n"),
            Some("example.com/app".to_string())
        );
        assert_eq!(parse_module_directive("go 1.22\n"), None);
        assert_eq!(parse_module_directive("modules x\n"), None);
    }

    #[test]
    fn loads_from_disk_and_skips_vendor() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("go.mod"), "module example.com/m\n\ngo 1.22\n").unwrap();
        fs::create_dir_all(root.join("util")).unwrap();
        fs::create_dir_all(root.join("vendor/dep")).unwrap();
        fs::write(root.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
        fs::write(root.join("util/util.go"), "package util\n\nfunc Helper() {}\n").unwrap();
        fs::write(
            root.join("util/util_test.go"),
            "package util_test\n\nimport \"testing\"\n\nfunc TestHelper(t *testing.T) {}\n",
        )
        .unwrap();
        fs::write(root.join("vendor/dep/dep.go"), "package dep\n").unwrap();

        let ws = load(root, &LoadOptions::default()).unwrap();
        assert_eq!(ws.packages().len(), 2);
        assert_eq!(ws.module(), Some("example.com/m"));
        let util = ws.find_package("example.com/m/util").unwrap();
        let pkg = ws.package(util);
        assert_eq!(pkg.name, "util");
        assert_eq!(pkg.test_files.len(), 1);
        let test_file = ws.file(pkg.test_files["util_test.go"]);
        assert!(test_file.external_test);
        assert!(pkg.symbols.functions.contains_key("Helper"));
    }

    #[test]
    fn mismatched_package_clause_is_skipped() {
        let ws = Workspace::from_sources(
            "/ws",
            None,
            &[
                ("p/a.go", "package p\n"),
                ("p/b.go", "package p\n\nfunc B() {}\n"),
                ("p/c.go", "package q\n\nfunc C() {}\n"),
            ],
        )
        .unwrap();
        let p = ws.find_package("p").unwrap();
        assert_eq!(ws.package(p).files.len(), 2);
        assert!(ws.package(p).symbols.functions.get("C").is_none());
    }

    #[test]
    fn empty_workspace_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(dir.path(), &LoadOptions::default()),
            Err(LoadError::Empty(_))
        ));
    }
}
