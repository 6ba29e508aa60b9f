//! `.gorefactor.toml` workspace configuration.

pub mod loader;
pub mod schema;

pub use loader::{load_for_workspace, load_from_path, load_from_str, ConfigError, CONFIG_FILE_NAME};
pub use schema::{
    AliasSection, Config, FacadeSection, LogSection, PlannerSection, ValidationError,
    ValidationIssue, WorkspaceSection, DEFAULT_ALIAS_LENGTH, DEFAULT_FACADE_FILE,
    DEFAULT_LOG_LEVEL,
};
