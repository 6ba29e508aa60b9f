//! Plans: byte-level changes plus their aggregated impact.

pub mod batch;
pub mod persist;
pub mod validator;
pub mod writer;

pub use batch::BatchComposer;
pub use persist::{PersistError, PlanDocument, PlanStep, PLAN_FORMAT_VERSION};
pub use validator::{validate_plan, ValidationReport};
pub use writer::{apply, apply_in_memory, render_diff, render_preview, ApplySummary};

use crate::error::RefactorError;
use crate::ops::AnyOperation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Replacement of `bytes[start..end]` of a workspace-relative file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
    /// Empty for pure insertions; otherwise the spanned bytes.
    pub old_text: String,
    pub new_text: String,
    pub description: String,
}

impl Change {
    pub fn replace(
        file: impl Into<PathBuf>,
        range: Range<usize>,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            start: range.start,
            end: range.end,
            old_text: old_text.into(),
            new_text: new_text.into(),
            description: description.into(),
        }
    }

    /// Replace `range` of `source`, recording the spanned text.
    pub fn span(
        file: impl Into<PathBuf>,
        source: &str,
        range: Range<usize>,
        new_text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let old = source[range.clone()].to_string();
        Self::replace(file, range, old, new_text, description)
    }

    pub fn insert(
        file: impl Into<PathBuf>,
        at: usize,
        text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::replace(file, at..at, "", text, description)
    }

    pub fn delete(
        file: impl Into<PathBuf>,
        source: &str,
        range: Range<usize>,
        description: impl Into<String>,
    ) -> Self {
        Self::span(file, source, range, "", description)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    /// Whether two changes of the same file touch overlapping bytes. An
    /// insertion conflicts with a range it falls strictly inside, and with
    /// another insertion at the same offset.
    pub fn overlaps(&self, other: &Change) -> bool {
        if self.file != other.file {
            return false;
        }
        match (self.is_insertion(), other.is_insertion()) {
            (true, true) => self.start == other.start,
            (true, false) => other.start < self.start && self.start < other.end,
            (false, true) => self.start < other.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }
}

/// Apply order: file ascending, then start descending (insertions after
/// replacements that begin at the same offset).
pub fn sort_changes(changes: &mut [Change]) {
    changes.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(b.start.cmp(&a.start))
            .then(b.end.cmp(&a.end))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    InvalidOperation,
    NameConflict,
    ImportCycle,
    VisibilityViolation,
    CompilationSuspect,
    SymbolNotFound,
    ParseError,
    FilesystemError,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::InvalidOperation => "invalid-operation",
            IssueKind::NameConflict => "name-conflict",
            IssueKind::ImportCycle => "import-cycle",
            IssueKind::VisibilityViolation => "visibility-violation",
            IssueKind::CompilationSuspect => "compilation-suspect",
            IssueKind::SymbolNotFound => "symbol-not-found",
            IssueKind::ParseError => "parse-error",
            IssueKind::FilesystemError => "filesystem-error",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, message)
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&RefactorError> for Issue {
    fn from(err: &RefactorError) -> Self {
        let issue = Issue::error(err.kind(), err.to_string());
        match err.location() {
            Some(loc) => issue.at(loc.file.clone(), loc.line),
            None => issue,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)?;
        if let Some(file) = &self.file {
            write!(f, " ({}", file.display())?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Coupling metrics of one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingMetrics {
    pub package: String,
    /// Workspace packages importing this one.
    pub afferent: usize,
    /// Workspace packages this one imports.
    pub efferent: usize,
    /// `efferent / (afferent + efferent)`, zero for isolated packages.
    pub instability: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedMove {
    pub symbol: String,
    pub from_package: String,
    pub to_package: String,
    pub reason: String,
}

/// Import edge (by import path) a plan introduces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImportEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub affected_packages: BTreeSet<String>,
    pub suggested_moves: Vec<SuggestedMove>,
    pub coupling: Vec<CouplingMetrics>,
    /// Import cycles present in the workspace, by import path.
    pub cycles: Vec<Vec<String>>,
    pub new_import_edges: BTreeSet<ImportEdge>,
    pub removed_import_edges: BTreeSet<ImportEdge>,
    pub issues: Vec<Issue>,
}

impl ImpactAnalysis {
    pub fn merge(&mut self, other: ImpactAnalysis) {
        self.affected_packages.extend(other.affected_packages);
        self.suggested_moves.extend(other.suggested_moves);
        self.coupling.extend(other.coupling);
        self.cycles.extend(other.cycles);
        self.new_import_edges.extend(other.new_import_edges);
        self.removed_import_edges.extend(other.removed_import_edges);
        self.issues.extend(other.issues);
    }
}

/// File the writer materializes before applying changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub path: PathBuf,
    pub content: String,
}

/// File relocation performed after every change is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub operations: Vec<AnyOperation>,
    pub changes: Vec<Change>,
    pub affected_files: BTreeSet<PathBuf>,
    pub impact: ImpactAnalysis,
    pub reversible: bool,
    pub new_files: Vec<NewFile>,
    pub file_moves: Vec<FileMove>,
    /// First failure of a non-atomic batch.
    pub error: Option<RefactorError>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
            changes: Vec::new(),
            affected_files: BTreeSet::new(),
            impact: ImpactAnalysis::default(),
            reversible: true,
            new_files: Vec::new(),
            file_moves: Vec::new(),
            error: None,
        }
    }
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_operation(op: AnyOperation) -> Self {
        Self {
            operations: vec![op],
            ..Self::default()
        }
    }

    pub fn push(&mut self, change: Change) {
        self.affected_files.insert(change.file.clone());
        self.changes.push(change);
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = Change>) {
        for change in changes {
            self.push(change);
        }
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.impact.issues.push(issue);
    }

    pub fn touch_package(&mut self, import_path: impl Into<String>) {
        self.impact.affected_packages.insert(import_path.into());
    }

    pub fn create_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        self.affected_files.insert(path.clone());
        self.new_files.push(NewFile {
            path,
            content: content.into(),
        });
    }

    pub fn move_file(&mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) {
        let (from, to) = (from.into(), to.into());
        self.affected_files.insert(from.clone());
        self.affected_files.insert(to.clone());
        self.file_moves.push(FileMove { from, to });
    }

    pub fn new_file(&self, path: &Path) -> Option<&NewFile> {
        self.new_files.iter().find(|f| f.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.new_files.is_empty() && self.file_moves.is_empty()
    }

    pub fn changes_in<'p>(&'p self, file: &'p Path) -> impl Iterator<Item = &'p Change> + 'p {
        self.changes.iter().filter(move |c| c.file == file)
    }

    /// Fold `other` into this plan (no conflict checking).
    pub fn merge(&mut self, other: Plan) {
        self.operations.extend(other.operations);
        self.extend(other.changes);
        self.affected_files.extend(other.affected_files);
        self.impact.merge(other.impact);
        self.reversible &= other.reversible;
        self.new_files.extend(other.new_files);
        self.file_moves.extend(other.file_moves);
        if self.error.is_none() {
            self.error = other.error;
        }
    }

    /// Sort changes into apply order.
    pub fn sort(&mut self) {
        sort_changes(&mut self.changes);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.impact.issues
    }

    pub fn has_errors(&self) -> bool {
        self.impact.issues.iter().any(Issue::is_error)
    }

    /// Demote every error to a warning.
    pub fn downgrade_errors(&mut self) {
        for issue in &mut self.impact.issues {
            if issue.severity == Severity::Error {
                issue.severity = Severity::Warning;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ch(start: usize, end: usize) -> Change {
        Change::replace("f.go", start..end, "", "x", "test")
    }

    #[test]
    fn overlap_rules() {
        assert!(ch(0, 5).overlaps(&ch(4, 6)));
        assert!(!ch(0, 5).overlaps(&ch(5, 6)));
        assert!(ch(3, 3).overlaps(&ch(3, 3)));
        assert!(!ch(3, 3).overlaps(&ch(3, 6)));
        assert!(ch(4, 4).overlaps(&ch(3, 6)));
        let other_file = Change::replace("g.go", 0..5, "", "", "");
        assert!(!ch(0, 5).overlaps(&other_file));
    }

    #[test]
    fn sort_is_file_then_descending_start() {
        let mut changes = vec![
            Change::insert("b.go", 1, "x", ""),
            Change::insert("a.go", 1, "x", ""),
            Change::insert("a.go", 9, "x", ""),
        ];
        sort_changes(&mut changes);
        let order: Vec<_> = changes
            .iter()
            .map(|c| (c.file.to_string_lossy().into_owned(), c.start))
            .collect();
        assert_eq!(
            order,
            [("a.go".to_string(), 9), ("a.go".to_string(), 1), ("b.go".to_string(), 1)]
        );
    }

    #[test]
    fn downgrade_errors_keeps_messages() {
        let mut plan = Plan::new();
        plan.add_issue(Issue::error(IssueKind::NameConflict, "dup"));
        assert!(plan.has_errors());
        plan.downgrade_errors();
        assert!(!plan.has_errors());
        assert_eq!(plan.issues()[0].message, "dup");
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in 0usize..50, b in 0usize..50, c in 0usize..50, d in 0usize..50) {
            let x = ch(a.min(b), a.max(b));
            let y = ch(c.min(d), c.max(d));
            prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
        }

        #[test]
        fn sorted_within_file_is_descending(starts in proptest::collection::vec(0usize..200, 1..20)) {
            let mut changes: Vec<Change> = starts.iter().map(|s| ch(*s, *s + 1)).collect();
            sort_changes(&mut changes);
            for pair in changes.windows(2) {
                prop_assert!(pair[0].start >= pair[1].start);
            }
        }
    }
}
