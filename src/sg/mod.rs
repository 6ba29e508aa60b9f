//! ast-grep integration for pattern-based Go code matching.
//!
//! Patterns use ast-grep's metavariable syntax (`$NAME`, `$$$ARGS`, `$_`).
//! Extract-constant uses them to find every occurrence of a literal value.

pub mod errors;
pub mod lang;
pub mod matcher;
pub mod replacer;

pub use errors::AstGrepError;
pub use lang::{go, SupportLang};
pub use matcher::{PatternMatch, PatternMatcher};
pub use replacer::Replacement;
