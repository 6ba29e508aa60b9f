use crate::config::schema::{Config, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the configuration file looked up at the workspace root.
pub const CONFIG_FILE_NAME: &str = ".gorefactor.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML{}: {source}", describe(path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid config{}: {source}", describe(path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },
}

fn describe(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Config, ConfigError> {
    let config: Config = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Configuration for `root`: the explicit file when given (it must exist),
/// otherwise `.gorefactor.toml` at the root when present, otherwise the
/// built-in defaults.
pub fn load_for_workspace(root: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = root.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        debug!(path = %candidate.display(), "loading workspace config");
        return load_from_path(&candidate);
    }
    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    #[test]
    fn empty_file_yields_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.planner.atomic);
        assert!(!config.planner.allow_breaking);
        assert!(config.workspace.include_tests);
        assert_eq!(config.aliases.length, 3);
        assert_eq!(config.facade.file_name, "facade.go");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let config = load_from_str(
            r#"
[workspace]
exclude = ["vendor", "testdata"]
include_tests = false

[planner]
atomic = false
allow_breaking = true

[aliases]
length = 4

[facade]
file_name = "api.go"

[log]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.workspace.exclude, vec!["vendor", "testdata"]);
        assert!(!config.load_options().include_tests);
        assert!(!config.planner.atomic);
        assert!(config.planner.allow_breaking);
        assert_eq!(config.aliases.length, 4);
        assert_eq!(config.facade.file_name, "api.go");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn validation_collects_every_issue() {
        let err = load_from_str(
            r#"
[workspace]
exclude = ["../outside"]

[aliases]
length = 0

[facade]
file_name = "sub/facade.txt"

[log]
level = "loud"
"#,
        )
        .unwrap_err();
        let ConfigError::Validation { source, .. } = err else {
            panic!("expected validation error, got {err}");
        };
        let fields: Vec<_> = source
            .issues
            .iter()
            .map(|issue| match issue {
                ValidationIssue::MissingField { field } => *field,
                ValidationIssue::InvalidValue { field, .. } => *field,
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                "workspace.exclude",
                "aliases.length",
                "facade.file_name",
                "facade.file_name",
                "log.level"
            ]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_from_str("[planner]\natomik = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn workspace_lookup_prefers_explicit_then_root_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_for_workspace(dir.path(), None).unwrap();
        assert_eq!(config, Config::default());

        fs::write(dir.path().join(CONFIG_FILE_NAME), "[aliases]\nlength = 5\n").unwrap();
        assert_eq!(load_for_workspace(dir.path(), None).unwrap().aliases.length, 5);

        let other = dir.path().join("other.toml");
        fs::write(&other, "[aliases]\nlength = 2\n").unwrap();
        assert_eq!(
            load_for_workspace(dir.path(), Some(&other)).unwrap().aliases.length,
            2
        );

        let missing = dir.path().join("missing.toml");
        let err = load_for_workspace(dir.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        fs::write(&other, "[log]\nlevel = 3\n").unwrap();
        let err = load_for_workspace(dir.path(), Some(&other)).unwrap_err();
        assert!(err.to_string().contains("other.toml"));
    }
}
