//! Thread-local parser pooling.
//!
//! Loading a workspace parses hundreds of files and the validator reparses
//! every generated fragment, so one Go parser is kept per thread and reused.

use crate::ts::{GoParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static GO_PARSER: RefCell<Option<GoParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// On first call per thread, creates new parser. Subsequent calls reuse
/// the same parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use gorefactor::pool::with_parser;
///
/// let tree = with_parser(|parser| parser.parse("package main\n"))??;
/// assert_eq!(tree.root_node().kind(), "source_file");
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut GoParser) -> R,
{
    GO_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(GoParser::new()?);
        }
        slot.as_mut().map(f).ok_or(TreeSitterError::LanguageSet)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_reused() {
        let first = with_parser(|p| p.parse("package a\n").map(|t| t.root_node().kind().to_string()));
        let second = with_parser(|p| p.parse("package b\n").map(|t| t.root_node().kind().to_string()));
        assert_eq!(first.unwrap().unwrap(), "source_file");
        assert_eq!(second.unwrap().unwrap(), "source_file");
    }
}
