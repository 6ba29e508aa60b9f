//! Refactoring error taxonomy.
//!
//! Every failure the planner reports is a [`RefactorError`] value carrying a
//! kind tag, a message and an optional `(file, line)` location. Lower-level
//! errors convert into it with `From`.

use crate::edit::EditError;
use crate::plan::{IssueKind, PersistError};
use crate::safety::SafetyError;
use crate::ts::TreeSitterError;
use crate::workspace::LoadError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of candidate names listed by a symbol-not-found error.
pub const MAX_CANDIDATES: usize = 20;

const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file.display()),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefactorError {
    #[error("invalid operation: {message}")]
    InvalidOperation {
        message: String,
        location: Option<Location>,
    },

    #[error("symbol '{name}' not found in {scope}{}{}", suggestion(.name, .available), candidates(.available))]
    SymbolNotFound {
        name: String,
        scope: String,
        available: Vec<String>,
    },

    #[error("name conflict: '{name}' already declared in {scope}")]
    NameConflict {
        name: String,
        scope: String,
        location: Option<Location>,
    },

    #[error("visibility violation: {message}")]
    VisibilityViolation {
        message: String,
        location: Option<Location>,
    },

    #[error("import cycle: {message}")]
    ImportCycle { message: String },

    #[error("parse error: {message}")]
    Parse {
        message: String,
        location: Option<Location>,
    },

    #[error("filesystem error: {message}")]
    Filesystem {
        message: String,
        location: Option<Location>,
    },

    #[error("compilation suspect: {message}")]
    CompilationSuspect {
        message: String,
        location: Option<Location>,
    },
}

/// Closest available name, for typos such as `Fecth` for `Fetch`.
fn suggestion(name: &str, available: &[String]) -> String {
    available
        .iter()
        .map(|c| (strsim::jaro_winkler(name, c), c))
        .filter(|(score, c)| *score >= SUGGESTION_THRESHOLD && c.as_str() != name)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| format!("; did you mean '{c}'?"))
        .unwrap_or_default()
}

fn candidates(available: &[String]) -> String {
    if available.is_empty() {
        return String::new();
    }
    let shown: Vec<&str> = available
        .iter()
        .take(MAX_CANDIDATES)
        .map(String::as_str)
        .collect();
    let more = available.len().saturating_sub(MAX_CANDIDATES);
    if more > 0 {
        format!(" (available: {}, and {more} more)", shown.join(", "))
    } else {
        format!(" (available: {})", shown.join(", "))
    }
}

impl RefactorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RefactorError::InvalidOperation {
            message: message.into(),
            location: None,
        }
    }

    pub fn not_found(
        name: impl Into<String>,
        scope: impl Into<String>,
        available: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        RefactorError::SymbolNotFound {
            name: name.into(),
            scope: scope.into(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    pub fn conflict(name: impl Into<String>, scope: impl Into<String>) -> Self {
        RefactorError::NameConflict {
            name: name.into(),
            scope: scope.into(),
            location: None,
        }
    }

    pub fn visibility(message: impl Into<String>) -> Self {
        RefactorError::VisibilityViolation {
            message: message.into(),
            location: None,
        }
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        RefactorError::ImportCycle {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        RefactorError::Parse {
            message: message.into(),
            location: None,
        }
    }

    pub fn filesystem(message: impl Into<String>) -> Self {
        RefactorError::Filesystem {
            message: message.into(),
            location: None,
        }
    }

    /// Attach a location to variants that carry one.
    pub fn at(mut self, file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        let loc = Some(Location {
            file: file.into(),
            line,
        });
        match &mut self {
            RefactorError::InvalidOperation { location, .. }
            | RefactorError::NameConflict { location, .. }
            | RefactorError::VisibilityViolation { location, .. }
            | RefactorError::Parse { location, .. }
            | RefactorError::Filesystem { location, .. }
            | RefactorError::CompilationSuspect { location, .. } => *location = loc,
            RefactorError::SymbolNotFound { .. } | RefactorError::ImportCycle { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> IssueKind {
        match self {
            RefactorError::InvalidOperation { .. } => IssueKind::InvalidOperation,
            RefactorError::SymbolNotFound { .. } => IssueKind::SymbolNotFound,
            RefactorError::NameConflict { .. } => IssueKind::NameConflict,
            RefactorError::VisibilityViolation { .. } => IssueKind::VisibilityViolation,
            RefactorError::ImportCycle { .. } => IssueKind::ImportCycle,
            RefactorError::Parse { .. } => IssueKind::ParseError,
            RefactorError::Filesystem { .. } => IssueKind::FilesystemError,
            RefactorError::CompilationSuspect { .. } => IssueKind::CompilationSuspect,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            RefactorError::InvalidOperation { location, .. }
            | RefactorError::NameConflict { location, .. }
            | RefactorError::VisibilityViolation { location, .. }
            | RefactorError::Parse { location, .. }
            | RefactorError::Filesystem { location, .. }
            | RefactorError::CompilationSuspect { location, .. } => location.as_ref(),
            RefactorError::SymbolNotFound { .. } | RefactorError::ImportCycle { .. } => None,
        }
    }

    /// Prefix the message with the failing batch step.
    pub fn in_step(self, step: usize, description: &str) -> Self {
        RefactorError::InvalidOperation {
            message: format!("step {} ({description}) failed: {self}", step + 1),
            location: self.location().cloned(),
        }
    }
}

impl From<TreeSitterError> for RefactorError {
    fn from(err: TreeSitterError) -> Self {
        RefactorError::parse(err.to_string())
    }
}

impl From<std::io::Error> for RefactorError {
    fn from(err: std::io::Error) -> Self {
        RefactorError::filesystem(err.to_string())
    }
}

impl From<EditError> for RefactorError {
    fn from(err: EditError) -> Self {
        let path = match &err {
            EditError::BeforeTextMismatch { file, .. } => Some(file.clone()),
            _ => None,
        };
        let out = RefactorError::filesystem(err.to_string());
        match path {
            Some(path) => out.at(path, None),
            None => out,
        }
    }
}

impl From<SafetyError> for RefactorError {
    fn from(err: SafetyError) -> Self {
        RefactorError::filesystem(err.to_string())
    }
}

impl From<LoadError> for RefactorError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Parse(inner) => inner.into(),
            other => RefactorError::filesystem(other.to_string()),
        }
    }
}

impl From<PersistError> for RefactorError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Io { .. } => RefactorError::filesystem(err.to_string()),
            other => RefactorError::invalid(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_at_most_twenty_candidates() {
        let names: Vec<String> = (0..25).map(|i| format!("S{i}")).collect();
        let err = RefactorError::not_found("Missing", "package a", names);
        let text = err.to_string();
        assert!(text.contains("S19"));
        assert!(!text.contains("S20,"));
        assert!(text.contains("and 5 more"));
        assert_eq!(err.kind(), IssueKind::SymbolNotFound);
    }

    #[test]
    fn not_found_suggests_close_names() {
        let err = RefactorError::not_found("Fecth", "package store", ["Fetch", "Store"]);
        assert!(err.to_string().contains("did you mean 'Fetch'?"));

        let err = RefactorError::not_found("Zzz", "package store", ["Fetch", "Store"]);
        assert!(!err.to_string().contains("did you mean"));
    }

    #[test]
    fn location_attaches() {
        let err = RefactorError::invalid("bad").at("a/a.go", Some(3));
        assert_eq!(err.location().unwrap().to_string(), "a/a.go:3");
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
    }

    #[test]
    fn step_wraps_message() {
        let err = RefactorError::conflict("Bar", "package a").in_step(1, "rename Foo");
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
        assert!(err.to_string().contains("step 2 (rename Foo)"));
    }
}
