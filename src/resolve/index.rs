//! Workspace-wide reverse index from symbols to their occurrences.

use crate::resolve::walk::{bind_file, Binder};
use crate::workspace::{FileId, PackageId, SymbolId, Workspace};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// One occurrence of an identifier that denotes a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub symbol: SymbolId,
    pub name: String,
    pub file: FileId,
    pub path: PathBuf,
    pub package: PackageId,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    /// The declaring identifier of the symbol.
    pub is_definition: bool,
    /// Bound by name only; the receiver type could not be inferred.
    pub ambiguous: bool,
    /// Span of the `pkg` qualifier for `pkg.Name` occurrences.
    pub qualifier: Option<Range<usize>>,
}

impl Reference {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.name.len()
    }

    pub fn is_qualified(&self) -> bool {
        self.qualifier.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    refs: Vec<Reference>,
    by_symbol: HashMap<SymbolId, Vec<usize>>,
    by_file: BTreeMap<FileId, Vec<usize>>,
}

impl ReferenceIndex {
    /// One pass over every file of the workspace.
    pub fn build(ws: &Workspace) -> Self {
        let started = Instant::now();
        let binder = Binder::new(ws);
        let mut refs = Vec::new();
        let mut seen: HashSet<(SymbolId, FileId, usize)> = HashSet::new();

        for id in ws.symbol_ids() {
            let sym = ws.symbol(id);
            seen.insert((id, sym.file, sym.offset));
            refs.push(make_ref(ws, id, sym.file, sym.offset, true, false, None));
        }

        for file in ws.files() {
            for occ in bind_file(&binder, file) {
                if ws.symbol(occ.symbol).name.len() != occ.len {
                    continue;
                }
                if !seen.insert((occ.symbol, file.id, occ.offset)) {
                    continue;
                }
                refs.push(make_ref(
                    ws,
                    occ.symbol,
                    file.id,
                    occ.offset,
                    false,
                    occ.ambiguous,
                    occ.qualifier,
                ));
            }
        }

        let index = Self::from_refs(refs);
        info!(
            references = index.refs.len(),
            ambiguous = index.ambiguous_count(),
            files = ws.files().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reference index built"
        );
        index
    }

    fn from_refs(mut refs: Vec<Reference>) -> Self {
        refs.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.offset.cmp(&b.offset))
                .then(a.symbol.cmp(&b.symbol))
        });
        let mut by_symbol: HashMap<SymbolId, Vec<usize>> = HashMap::new();
        let mut by_file: BTreeMap<FileId, Vec<usize>> = BTreeMap::new();
        for (idx, r) in refs.iter().enumerate() {
            by_symbol.entry(r.symbol).or_default().push(idx);
            by_file.entry(r.file).or_default().push(idx);
        }
        Self {
            refs,
            by_symbol,
            by_file,
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.refs.iter()
    }

    /// Definition first, then uses in document order.
    pub fn references(&self, symbol: SymbolId) -> Vec<&Reference> {
        let mut out: Vec<&Reference> = self
            .by_symbol
            .get(&symbol)
            .into_iter()
            .flatten()
            .map(|i| &self.refs[*i])
            .collect();
        out.sort_by_key(|r| !r.is_definition);
        out
    }

    /// Uses only (no definition).
    pub fn uses(&self, symbol: SymbolId) -> Vec<&Reference> {
        self.references(symbol)
            .into_iter()
            .filter(|r| !r.is_definition)
            .collect()
    }

    pub fn definition(&self, symbol: SymbolId) -> Option<&Reference> {
        self.references(symbol).into_iter().find(|r| r.is_definition)
    }

    /// References restricted to files of `packages`.
    pub fn references_in(&self, symbol: SymbolId, packages: &[PackageId]) -> Vec<&Reference> {
        self.references(symbol)
            .into_iter()
            .filter(|r| packages.contains(&r.package))
            .collect()
    }

    /// Every reference in `file`, ordered by offset.
    pub fn in_file(&self, file: FileId) -> Vec<&Reference> {
        self.by_file
            .get(&file)
            .into_iter()
            .flatten()
            .map(|i| &self.refs[*i])
            .collect()
    }

    pub fn ambiguous_count(&self) -> usize {
        self.refs.iter().filter(|r| r.ambiguous).count()
    }
}

fn make_ref(
    ws: &Workspace,
    symbol: SymbolId,
    file: FileId,
    offset: usize,
    is_definition: bool,
    ambiguous: bool,
    qualifier: Option<Range<usize>>,
) -> Reference {
    let f = ws.file(file);
    let (line, column) = f.line_col(offset);
    Reference {
        symbol,
        name: ws.symbol(symbol).name.clone(),
        file,
        path: f.path.clone(),
        package: f.package,
        line,
        column,
        offset,
        is_definition,
        ambiguous,
        qualifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workspace {
        Workspace::from_sources(
            "/ws",
            Some("example.com/app"),
            &[
                ("a/a.go", "package a\n\nfunc Foo() int { return 1 }\n\nfunc Twice() int { return Foo() + Foo() }\n"),
                (
                    "b/b.go",
                    "package b\n\nimport \"example.com/app/a\"\n\nfunc Use() int { return a.Foo() }\n",
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn definition_first_then_document_order() {
        let ws = sample();
        let index = ReferenceIndex::build(&ws);
        let a = ws.find_package("a").unwrap();
        let foo = ws.package(a).symbols.functions["Foo"];
        let refs = index.references(foo);
        assert_eq!(refs.len(), 4);
        assert!(refs[0].is_definition);
        assert_eq!(refs.iter().filter(|r| r.is_definition).count(), 1);
        let qualified: Vec<_> = refs.iter().filter(|r| r.is_qualified()).collect();
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].path, PathBuf::from("b/b.go"));
    }

    #[test]
    fn every_reference_spans_the_name() {
        let ws = sample();
        let index = ReferenceIndex::build(&ws);
        for r in index.iter() {
            let file = ws.file(r.file);
            assert_eq!(&file.source[r.range()], r.name);
        }
    }

    #[test]
    fn filtered_by_package() {
        let ws = sample();
        let index = ReferenceIndex::build(&ws);
        let a = ws.find_package("a").unwrap();
        let b = ws.find_package("b").unwrap();
        let foo = ws.package(a).symbols.functions["Foo"];
        assert_eq!(index.references_in(foo, &[b]).len(), 1);
        assert_eq!(index.references_in(foo, &[a]).len(), 3);
    }
}
