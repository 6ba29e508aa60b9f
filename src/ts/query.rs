use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use std::collections::HashMap;
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

/// A match from a tree-sitter query with captured nodes.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// The full match byte range
    pub byte_start: usize,
    pub byte_end: usize,
    /// Named captures: capture_name -> (byte_start, byte_end, text)
    pub captures: HashMap<String, CapturedNode>,
}

impl QueryMatch {
    pub fn capture(&self, name: &str) -> Option<&CapturedNode> {
        self.captures.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct CapturedNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
    pub kind: String,
}

/// Engine for executing tree-sitter queries against parsed Go source.
pub struct QueryEngine {
    query: Query,
    capture_names: Vec<String>,
}

impl QueryEngine {
    /// Create a new query engine from a tree-sitter query string.
    ///
    /// # Query Syntax
    ///
    /// Tree-sitter queries use S-expression syntax:
    /// ```text
    /// (function_declaration
    ///   name: (identifier) @func_name
    ///   body: (block) @body)
    /// ```
    ///
    /// Captures are prefixed with `@` and can be referenced by name.
    pub fn new(query_str: &str) -> Result<Self, TreeSitterError> {
        let language = SupportLang::Go.get_ts_language();
        let query = Query::new(&language, query_str).map_err(|e| TreeSitterError::InvalidQuery {
            message: e.to_string(),
        })?;

        let capture_names = query.capture_names().iter().map(|s| s.to_string()).collect();

        Ok(Self {
            query,
            capture_names,
        })
    }

    /// Execute the query below `root` and return all matches.
    pub fn find_all(&self, root: Node<'_>, source: &str) -> Vec<QueryMatch> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, root, source.as_bytes());

        let mut results = Vec::new();

        // tree-sitter 0.25+ uses StreamingIterator
        while let Some(m) = matches.next() {
            let mut captures = HashMap::new();
            let mut overall_start = usize::MAX;
            let mut overall_end = 0usize;

            for capture in m.captures {
                let node = capture.node;
                let name = &self.capture_names[capture.index as usize];

                overall_start = overall_start.min(node.start_byte());
                overall_end = overall_end.max(node.end_byte());

                captures.insert(
                    name.clone(),
                    CapturedNode {
                        byte_start: node.start_byte(),
                        byte_end: node.end_byte(),
                        text: source[node.byte_range()].to_string(),
                        kind: node.kind().to_string(),
                    },
                );
            }

            if overall_start != usize::MAX {
                results.push(QueryMatch {
                    byte_start: overall_start,
                    byte_end: overall_end,
                    captures,
                });
            }
        }

        results
    }
}

/// Common tree-sitter queries for Go constructs.
pub mod queries {
    /// Every import spec, grouped or not.
    pub const IMPORT_SPECS: &str = r#"(import_spec
        path: (_) @path
    ) @spec"#;

    /// Import specs carrying an explicit local name (alias, `_` or `.`).
    pub const ALIASED_IMPORT_SPECS: &str = r#"(import_spec
        name: (_) @alias
        path: (_) @path
    ) @spec"#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parser::GoParser;

    const SOURCE: &str = r#"package main

import (
	"fmt"
	str "strings"
	_ "embed"
)

import "os"
"#;

    #[test]
    fn every_import_spec_matches() {
        let mut parser = GoParser::new().unwrap();
        let parsed = parser.parse_with_source(SOURCE).unwrap();
        let engine = QueryEngine::new(queries::IMPORT_SPECS).unwrap();

        let paths: Vec<_> = engine
            .find_all(parsed.root_node(), SOURCE)
            .iter()
            .filter_map(|m| m.capture("path").map(|c| c.text.clone()))
            .collect();
        assert_eq!(paths, ["\"fmt\"", "\"strings\"", "\"embed\"", "\"os\""]);
    }

    #[test]
    fn aliased_specs_capture_the_name() {
        let mut parser = GoParser::new().unwrap();
        let parsed = parser.parse_with_source(SOURCE).unwrap();
        let engine = QueryEngine::new(queries::ALIASED_IMPORT_SPECS).unwrap();

        let matches = engine.find_all(parsed.root_node(), SOURCE);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].captures["alias"].text, "str");
        assert_eq!(matches[1].captures["alias"].kind, "blank_identifier");
        let spec = &matches[0].captures["spec"];
        assert_eq!(&SOURCE[spec.byte_start..spec.byte_end], "str \"strings\"");
    }

    #[test]
    fn malformed_query_is_rejected() {
        let result = QueryEngine::new("(import_spec path: @path");
        assert!(matches!(result, Err(TreeSitterError::InvalidQuery { .. })));
    }
}
