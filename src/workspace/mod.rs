//! Immutable workspace snapshot.
//!
//! Packages, files and symbols live in flat arenas and refer to each other
//! through integer handles ([`PackageId`], [`FileId`], [`SymbolId`]); a file
//! finds its package through its handle, never through ownership.

pub mod graph;
pub mod imports;
pub mod loader;
pub mod symbols;

pub use graph::DependencyGraph;
pub use imports::{default_package_name, FileImports, ImportDecl, ImportSpec};
pub use loader::{load, LoadError, LoadOptions};
pub use symbols::{
    is_exported, Param, Signature, Symbol, SymbolId, SymbolKind, SymbolTable, TypeHint, TypeRef,
};

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

/// Resolved source position. Lines and columns are 1-based; columns count
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub file: FileId,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// One parsed `.go` file.
pub struct SourceFile {
    pub id: FileId,
    /// Path relative to the workspace root.
    pub path: PathBuf,
    pub package: PackageId,
    pub source: String,
    pub tree: Tree,
    pub is_test: bool,
    /// `package foo_test` file living next to package `foo`.
    pub external_test: bool,
    /// Name from the file's own package clause.
    pub package_name: String,
    pub imports: FileImports,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, range: Range<usize>) -> &str {
        &self.source[range]
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// 1-based line and byte column of `offset`.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        (line_idx + 1, offset - line_start + 1)
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.line_col(offset).0
    }

    /// Byte offset at which 1-based `line` begins.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line.checked_sub(1)?).copied()
    }

    /// Byte offset of the end of 1-based `line` (before its newline).
    pub fn line_end(&self, line: usize) -> Option<usize> {
        let start = self.line_start(line)?;
        Some(
            self.source[start..]
                .find('\n')
                .map_or(self.source.len(), |i| start + i),
        )
    }

    /// Offset of a 1-based (line, column) pair.
    pub fn offset_of(&self, line: usize, column: usize) -> Option<usize> {
        let offset = self.line_start(line)? + column.checked_sub(1)?;
        (offset <= self.source.len()).then_some(offset)
    }

    /// Span of the package name in the package clause.
    pub fn package_name_range(&self) -> Option<Range<usize>> {
        let root = self.root();
        let mut cursor = root.walk();
        let clause = root
            .children(&mut cursor)
            .find(|c| c.kind() == "package_clause")?;
        let mut inner = clause.walk();
        let ident = clause
            .children(&mut inner)
            .find(|c| c.kind() == "package_identifier" || c.kind() == "identifier")?;
        Some(ident.byte_range())
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// A directory of `.go` files sharing one package clause.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    /// Directory relative to the workspace root (empty for the root).
    pub dir: PathBuf,
    pub name: String,
    pub import_path: String,
    /// File name -> production file.
    pub files: BTreeMap<String, FileId>,
    /// File name -> `_test.go` file.
    pub test_files: BTreeMap<String, FileId>,
    /// Sorted, de-duplicated import paths of production files.
    pub imports: Vec<String>,
    pub symbols: SymbolTable,
}

impl Package {
    /// Production files first, then test files.
    pub fn all_files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.values().chain(self.test_files.values()).copied()
    }
}

pub struct Workspace {
    root: PathBuf,
    module: Option<String>,
    packages: Vec<Package>,
    files: Vec<SourceFile>,
    symbols: Vec<Symbol>,
    by_dir: BTreeMap<PathBuf, PackageId>,
    import_to_dir: BTreeMap<String, PathBuf>,
    graph: DependencyGraph,
}

impl Workspace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Module path from `go.mod`, if any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0 as usize]
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.symbols.len() as u32).map(SymbolId)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn package_by_dir(&self, dir: &Path) -> Option<PackageId> {
        self.by_dir.get(dir).copied()
    }

    pub fn package_by_import_path(&self, import_path: &str) -> Option<PackageId> {
        let dir = self.import_to_dir.get(import_path)?;
        self.package_by_dir(dir)
    }

    pub fn dir_for_import_path(&self, import_path: &str) -> Option<&Path> {
        self.import_to_dir.get(import_path).map(PathBuf::as_path)
    }

    /// Import path a package in `dir` has (or would have).
    pub fn import_path_for_dir(&self, dir: &Path) -> String {
        let rel = dir.to_string_lossy().replace('\\', "/");
        match (self.module.as_deref(), rel.is_empty()) {
            (Some(module), true) => module.to_string(),
            (Some(module), false) => format!("{module}/{rel}"),
            (None, _) => rel,
        }
    }

    /// Locate a package by import path, workspace-relative directory or
    /// (unique) declared name, in that order.
    pub fn find_package(&self, spec: &str) -> Option<PackageId> {
        let spec = spec.trim_end_matches('/');
        if let Some(id) = self.package_by_import_path(spec) {
            return Some(id);
        }
        if let Some(id) = self.package_by_dir(Path::new(spec.trim_start_matches("./"))) {
            return Some(id);
        }
        let mut named = self.packages.iter().filter(|p| p.name == spec);
        match (named.next(), named.next()) {
            (Some(p), None) => Some(p.id),
            _ => None,
        }
    }

    pub fn file_by_path(&self, path: &Path) -> Option<FileId> {
        self.files.iter().find(|f| f.path == path).map(|f| f.id)
    }

    pub fn position(&self, file: FileId, offset: usize) -> Position {
        let (line, column) = self.file(file).line_col(offset);
        Position {
            file,
            line,
            column,
            offset,
        }
    }

    /// Name `spec` binds in its file: the alias, the workspace package's
    /// declared name, or the conventional default for external paths.
    pub fn import_local_name(&self, spec: &ImportSpec) -> String {
        if let Some(alias) = &spec.alias {
            return alias.clone();
        }
        match self.package_by_import_path(&spec.path) {
            Some(id) => self.package(id).name.clone(),
            None => default_package_name(&spec.path),
        }
    }

    /// Import spec of `file` bound to local name `name`.
    pub fn import_for_name(&self, file: FileId, name: &str) -> Option<&ImportSpec> {
        self.file(file)
            .imports
            .specs
            .iter()
            .filter(|s| s.is_qualifying())
            .find(|s| self.import_local_name(s) == name)
    }

    /// Workspace package `name` refers to when used as a qualifier in `file`.
    pub fn package_for_qualifier(&self, file: FileId, name: &str) -> Option<PackageId> {
        let spec = self.import_for_name(file, name)?;
        self.package_by_import_path(&spec.path)
    }

    /// Local name under which `file` imports `pkg`.
    pub fn qualifier_for(&self, file: FileId, pkg: PackageId) -> Option<String> {
        let import_path = &self.package(pkg).import_path;
        self.file(file)
            .imports
            .specs
            .iter()
            .filter(|s| s.is_qualifying())
            .find(|s| &s.path == import_path)
            .map(|s| self.import_local_name(s))
    }

    /// Type symbol a [`TypeRef`] written in `file` denotes.
    pub fn resolve_type_ref(&self, file: FileId, r: &TypeRef) -> Option<SymbolId> {
        let pkg = match &r.qualifier {
            Some(q) => self.package_for_qualifier(file, q)?,
            None => self.file(file).package,
        };
        self.package(pkg).symbols.types.get(&r.name).copied()
    }

    /// Function (or package-qualified function) a call hint refers to.
    pub fn resolve_function_ref(&self, file: FileId, r: &TypeRef) -> Option<SymbolId> {
        let pkg = match &r.qualifier {
            Some(q) => self.package_for_qualifier(file, q)?,
            None => self.file(file).package,
        };
        self.package(pkg).symbols.functions.get(&r.name).copied()
    }

    /// Production files of every package, sorted by path.
    pub fn production_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| !f.is_test)
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
                ("a/a.go", "package a\n\nfunc Foo() int { return 1 }\n"),
                (
                    "b/b.go",
                    "package b\n\nimport (\n\t\"example.com/app/a\"\n\tx \"strings\"\n)\n\nfunc Use() int { _ = x.ToUpper; return a.Foo() }\n",
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn bimap_and_lookup() {
        let ws = sample();
        let a = ws.find_package("a").unwrap();
        assert_eq!(ws.package(a).import_path, "example.com/app/a");
        assert_eq!(ws.find_package("example.com/app/a"), Some(a));
        assert_eq!(ws.dir_for_import_path("example.com/app/a"), Some(Path::new("a")));
        assert_eq!(ws.import_path_for_dir(Path::new("c/d")), "example.com/app/c/d");
    }

    #[test]
    fn graph_built_from_internal_imports() {
        let ws = sample();
        let a = ws.find_package("a").unwrap();
        let b = ws.find_package("b").unwrap();
        assert!(ws.graph().imports_directly(b, a));
        assert_eq!(ws.package(b).imports, ["example.com/app/a", "strings"]);
    }

    #[test]
    fn qualifiers_resolve_through_imports() {
        let ws = sample();
        let a = ws.find_package("a").unwrap();
        let b_file = ws.file_by_path(Path::new("b/b.go")).unwrap();
        assert_eq!(ws.package_for_qualifier(b_file, "a"), Some(a));
        assert_eq!(ws.qualifier_for(b_file, a).as_deref(), Some("a"));
        assert!(ws.import_for_name(b_file, "x").is_some());
        assert!(ws.import_for_name(b_file, "strings").is_none());
    }

    #[test]
    fn positions_are_one_based() {
        let ws = sample();
        let file = ws.file_by_path(Path::new("a/a.go")).unwrap();
        let offset = ws.file(file).source.find("Foo").unwrap();
        let pos = ws.position(file, offset);
        assert_eq!((pos.line, pos.column), (3, 6));
        assert_eq!(ws.file(file).offset_of(3, 6), Some(offset));
    }
}
