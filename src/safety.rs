use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Boundary checks for every path the plan writer touches: edited files,
/// created files and both ends of file moves must resolve inside the
/// workspace and outside Go's module cache and toolchain.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
    /// Canonical paths of forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside workspace: {} (workspace: {})", path.display(), workspace.display())]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("path is in forbidden directory: {} (forbidden: {})", path.display(), forbidden.display())]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("path escapes through '..': {}", .0.display())]
    ParentTraversal(PathBuf),

    #[error("failed to canonicalize {}: {source}", path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

impl WorkspaceGuard {
    /// The root is canonicalized so symlinked workspaces compare correctly.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = canonicalize(workspace_root.as_ref())?;
        let mut forbidden_paths = Vec::new();

        // Module cache and toolchain sources.
        let gopath = std::env::var_os("GOPATH")
            .map(PathBuf::from)
            .or_else(|| home::home_dir().map(|h| h.join("go")));
        if let Some(gopath) = gopath {
            if let Ok(cache) = gopath.join("pkg/mod").canonicalize() {
                forbidden_paths.push(cache);
            }
        }
        if let Some(goroot) = std::env::var_os("GOROOT") {
            if let Ok(goroot) = PathBuf::from(goroot).canonicalize() {
                forbidden_paths.push(goroot);
            }
        }

        for dir in [".git", "vendor"] {
            if let Ok(path) = workspace_root.join(dir).canonicalize() {
                forbidden_paths.push(path);
            }
        }

        Ok(Self {
            workspace_root,
            forbidden_paths,
        })
    }

    /// Check an existing path, returning its canonical form.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = canonicalize(&self.absolute(path.as_ref()))?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Check a path that may not exist yet (a file the plan creates or a
    /// move destination). The deepest existing ancestor is canonicalized
    /// and the missing tail appended; `..` components are refused.
    pub fn validate_new_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let absolute = self.absolute(path.as_ref());
        if absolute.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(SafetyError::ParentTraversal(absolute));
        }
        let mut existing = absolute.as_path();
        let mut tail = Vec::new();
        while !existing.exists() {
            let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                return Err(SafetyError::OutsideWorkspace {
                    path: absolute.clone(),
                    workspace: self.workspace_root.clone(),
                });
            };
            tail.push(name.to_owned());
            existing = parent;
        }
        let mut resolved = canonicalize(existing)?;
        for name in tail.into_iter().rev() {
            resolved.push(name);
        }
        self.check_canonical(&resolved)?;
        Ok(resolved)
    }

    /// Re-check a previously validated path immediately before writing.
    pub fn revalidate(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let canonical = canonicalize(path)?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }
        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    #[cfg(test)]
    pub fn with_forbidden(
        workspace_root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        Ok(Self {
            workspace_root: canonicalize(workspace_root.as_ref())?,
            forbidden_paths: forbidden,
        })
    }
}
