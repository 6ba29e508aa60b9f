//! Tree-sitter integration for structural Go code queries.
//!
//! This module provides CST-based parsing using tree-sitter's Go grammar,
//! enabling precise byte-span extraction for declarations, selectors and
//! import specs without losing comments or formatting.

pub mod errors;
pub mod nodes;
pub mod parser;
pub mod query;
pub mod validator;

pub use errors::TreeSitterError;
pub use parser::{ErrorNode, GoParser, ParsedSource};
pub use query::{CapturedNode, QueryEngine, QueryMatch};
pub use validator::{
    parses_as_any, validate_rewrite, validate_snippet, validate_syntax, SnippetCategory,
};
