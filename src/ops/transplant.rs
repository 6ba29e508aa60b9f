//! Re-homing a span of code into another file or package: references back
//! into the original package gain a qualifier, qualified references into
//! the destination lose theirs, and the imports the span relies on are
//! collected for the destination file.

use crate::ops::common::qualifier_sites;
use crate::resolve::ReferenceIndex;
use crate::workspace::{FileId, PackageId, SymbolId, Workspace};
use std::ops::Range;

pub struct Transplant<'a> {
    pub ws: &'a Workspace,
    pub index: &'a ReferenceIndex,
    /// File the code currently lives in.
    pub file: FileId,
    /// Destination package; `None` for one that does not exist yet.
    pub target: Option<PackageId>,
    pub target_import_path: String,
    /// Name the destination file uses for the original package.
    pub source_qualifier: String,
    /// Symbols travelling with the code; their references stay untouched.
    pub keep: Vec<SymbolId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transplanted {
    pub text: String,
    /// `(import path, alias)` pairs the destination file needs.
    pub imports: Vec<(String, Option<String>)>,
    /// The code still refers to its original package.
    pub uses_source: bool,
    /// Unexported original-package names the code refers to.
    pub unexported: Vec<String>,
}

impl Transplant<'_> {
    fn crossing(&self) -> bool {
        self.target != Some(self.ws.file(self.file).package)
    }

    /// Render `range` of the file for the destination, applying
    /// `substitutions` (absolute ranges) on the way.
    pub fn render(
        &self,
        range: Range<usize>,
        substitutions: Vec<(Range<usize>, String)>,
    ) -> Transplanted {
        let ws = self.ws;
        let file = ws.file(self.file);
        let source_pkg = file.package;
        let crossing = self.crossing();
        let mut out = Transplanted::default();
        let mut edits = substitutions;
        let mut stripped: Vec<Range<usize>> = Vec::new();

        for r in self.index.in_file(self.file) {
            if r.is_definition || r.offset < range.start || r.range().end > range.end {
                continue;
            }
            if self.keep.contains(&r.symbol) {
                continue;
            }
            let sym = ws.symbol(r.symbol);
            match &r.qualifier {
                None if crossing && sym.kind.is_top_level() && sym.package == source_pkg => {
                    edits.push((r.offset..r.offset, format!("{}.", self.source_qualifier)));
                    out.uses_source = true;
                    if !sym.exported() && !out.unexported.contains(&sym.name) {
                        out.unexported.push(sym.name.clone());
                    }
                }
                Some(q) if Some(sym.package) == self.target => {
                    edits.push((q.start..r.offset, String::new()));
                    stripped.push(q.clone());
                }
                _ => {}
            }
        }

        for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
            if spec.path == self.target_import_path {
                continue;
            }
            let local = ws.import_local_name(spec);
            let used = qualifier_sites(file, &local)
                .into_iter()
                .any(|site| site.start >= range.start && site.end <= range.end && !stripped.contains(&site));
            if used {
                out.imports.push((spec.path.clone(), spec.alias.clone()));
            }
        }

        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start).then(b.0.end.cmp(&a.0.end)));
        let mut text = file.source[range.clone()].to_string();
        for (r, new) in edits {
            if r.start < range.start || r.end > range.end {
                continue;
            }
            text.replace_range(r.start - range.start..r.end - range.start, &new);
        }
        out.text = text;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SRC: &str = "package src\n\nimport (\n\t\"fmt\"\n\t\"example.com/m/util\"\n)\n\nfunc helper() int { return 1 }\n\nfunc Run() { fmt.Println(helper(), util.Twice(2)) }\n";
    const UTIL: &str = "package util\n\nfunc Twice(n int) int { return n * 2 }\n";

    #[test]
    fn qualifies_source_and_unqualifies_target() {
        let ws = Workspace::from_sources(
            "/ws",
            Some("example.com/m"),
            &[("src/src.go", SRC), ("util/util.go", UTIL)],
        )
        .unwrap();
        let index = ReferenceIndex::build(&ws);
        let file = ws.file_by_path(Path::new("src/src.go")).unwrap();
        let util = ws.find_package("util").unwrap();
        let start = SRC.find("func Run").unwrap();
        let t = Transplant {
            ws: &ws,
            index: &index,
            file,
            target: Some(util),
            target_import_path: "example.com/m/util".into(),
            source_qualifier: "src".into(),
            keep: Vec::new(),
        };
        let out = t.render(start..SRC.len() - 1, Vec::new());
        assert_eq!(out.text, "func Run() { fmt.Println(src.helper(), Twice(2)) }");
        assert_eq!(out.imports, vec![("fmt".to_string(), None)]);
        assert!(out.uses_source);
        assert_eq!(out.unexported, ["helper"]);
    }
}
