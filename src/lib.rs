//! gorefactor: plan, validate and apply structured refactorings across Go
//! workspaces.
//!
//! A refactoring never writes as it goes. Every operation reads an
//! immutable [`Workspace`] snapshot and produces a [`Plan`]: byte-level
//! [`Change`]s plus an impact analysis and a list of issues. Plans can be
//! previewed, diffed, composed into batches, validated, persisted as JSON
//! and finally applied.
//!
//! # Architecture
//!
//! - [`workspace`] loads packages, files, symbols and the import graph.
//! - [`resolve`] binds identifiers to declarations and indexes references.
//! - [`ops`] holds the operations, each behind the [`Operation`] trait.
//! - [`plan`] composes, validates, renders and applies plans.
//! - [`edit`] is the write primitive: verified byte-span replacement with
//!   atomic file writes, guarded by [`safety`].
//!
//! # Example
//!
//! ```no_run
//! use gorefactor::ops::{Context, RenameSymbol, Scope};
//! use gorefactor::{load, LoadOptions, Operation, ReferenceIndex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ws = load(std::path::Path::new("path/to/module"), &LoadOptions::default())?;
//! let index = ReferenceIndex::build(&ws);
//! let cx = Context::new(&ws, &index);
//!
//! let op = RenameSymbol {
//!     package: Some("internal/store".into()),
//!     name: "Fetch".into(),
//!     new_name: "Load".into(),
//!     scope: Scope::Workspace,
//! };
//! op.validate(&cx)?;
//! let plan = op.execute(&cx)?;
//! println!("{}", gorefactor::render_preview(&plan, &ws));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod edit;
pub mod error;
pub mod ops;
pub mod plan;
pub mod pool;
pub mod resolve;
pub mod safety;
pub mod sg;
pub mod ts;
pub mod workspace;

// Re-exports
pub use config::{Config, ConfigError};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use error::RefactorError;
pub use ops::{AnyOperation, Context, Operation, OperationKind, Scope};
pub use plan::{
    apply, apply_in_memory, render_diff, render_preview, validate_plan, ApplySummary,
    BatchComposer, Change, ImpactAnalysis, Issue, IssueKind, PersistError, Plan, PlanDocument,
    Severity, ValidationReport,
};
pub use resolve::{Reference, ReferenceIndex};
pub use safety::{SafetyError, WorkspaceGuard};
pub use ts::{GoParser, TreeSitterError};
pub use workspace::{load, LoadError, LoadOptions, Workspace};
