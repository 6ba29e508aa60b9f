pub use crate::ops::facade::DEFAULT_FACADE_FILE;
use crate::workspace::LoadOptions;
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_ALIAS_LENGTH: usize = 3;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// `.gorefactor.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub aliases: AliasSection,
    #[serde(default)]
    pub facade: FacadeSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Directory names or workspace-relative paths the loader skips.
    pub exclude: Vec<String>,
    pub include_tests: bool,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            include_tests: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerSection {
    pub atomic: bool,
    pub allow_breaking: bool,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            atomic: true,
            allow_breaking: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AliasSection {
    pub length: usize,
}

impl Default for AliasSection {
    fn default() -> Self {
        Self {
            length: DEFAULT_ALIAS_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FacadeSection {
    pub file_name: String,
}

impl Default for FacadeSection {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FACADE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Check every section, collecting all issues rather than stopping at
    /// the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for entry in &self.workspace.exclude {
            if entry.trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    field: "workspace.exclude",
                    message: "entries must not be empty".to_string(),
                });
            } else if entry.split(['/', '\\']).any(|part| part == "..") {
                issues.push(ValidationIssue::InvalidValue {
                    field: "workspace.exclude",
                    message: format!("'{entry}' must stay inside the workspace"),
                });
            }
        }

        if self.aliases.length == 0 {
            issues.push(ValidationIssue::InvalidValue {
                field: "aliases.length",
                message: "must be at least 1".to_string(),
            });
        }

        let file_name = self.facade.file_name.trim();
        if file_name.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "facade.file_name",
            });
        } else {
            if !file_name.ends_with(".go") || file_name.ends_with("_test.go") {
                issues.push(ValidationIssue::InvalidValue {
                    field: "facade.file_name",
                    message: format!("'{file_name}' must be a non-test .go file name"),
                });
            }
            if file_name.contains(['/', '\\']) {
                issues.push(ValidationIssue::InvalidValue {
                    field: "facade.file_name",
                    message: format!("'{file_name}' must not contain a directory"),
                });
            }
        }

        let level = self.log.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            issues.push(ValidationIssue::InvalidValue {
                field: "log.level",
                message: format!(
                    "unknown level '{}' (expected one of {})",
                    self.log.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            exclude: self.workspace.exclude.clone(),
            include_tests: self.workspace.include_tests,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid '{field}': {message}")
            }
        }
    }
}
