use crate::cache;
use crate::sg::errors::AstGrepError;
use crate::sg::lang::go;
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_core::{AstGrep, NodeMatch};
use ast_grep_language::SupportLang;

/// A node matched by an ast-grep pattern.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Byte range of the entire match
    pub byte_start: usize,
    pub byte_end: usize,
    /// The matched text
    pub text: String,
    /// Kind of the matched node
    pub kind: String,
}

/// Pattern matcher over one Go source file.
///
/// Used with single-literal patterns such as `"application/json"` or
/// `` `raw` ``. Go statements and selector calls do not parse as standalone
/// patterns, so they are not searched this way.
pub struct PatternMatcher {
    source: String,
    sg: AstGrep<StrDoc<SupportLang>>,
}

impl PatternMatcher {
    /// Create a new pattern matcher for the given source code.
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            sg: AstGrep::new(source, go()),
        }
    }

    /// Find all matches for a pattern.
    pub fn find_all(&self, pattern: &str) -> Result<Vec<PatternMatch>, AstGrepError> {
        if pattern.trim().is_empty() {
            return Err(AstGrepError::InvalidPattern {
                message: "empty pattern".to_string(),
            });
        }
        let pat = cache::get_or_compile_pattern(pattern, go());
        let root = self.sg.root();
        Ok(root
            .find_all(&pat)
            .map(|m| self.node_match_to_pattern_match(m))
            .collect())
    }

    /// Find all nodes of the given kinds whose text equals `text`.
    ///
    /// Literal values containing `$` would be read as metavariables by the
    /// pattern compiler; this is the fallback for them.
    pub fn find_by_kind_and_text(&self, kinds: &[&str], text: &str) -> Vec<PatternMatch> {
        self.sg
            .root()
            .dfs()
            .filter(|node| kinds.iter().any(|k| node.kind() == *k))
            .filter_map(|node| {
                let range = node.range();
                let node_text = &self.source[range.start..range.end];
                (node_text == text).then(|| PatternMatch {
                    byte_start: range.start,
                    byte_end: range.end,
                    text: node_text.to_string(),
                    kind: node.kind().to_string(),
                })
            })
            .collect()
    }

    /// Get the source code.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn node_match_to_pattern_match(&self, m: NodeMatch<StrDoc<SupportLang>>) -> PatternMatch {
        let node = m.get_node();
        let range = node.range();
        let text = self.source[range.start..range.end].to_string();
        let kind = node.kind().to_string();

        PatternMatch {
            byte_start: range.start,
            byte_end: range.end,
            text,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package store

import "fmt"

const mode = "rw"

func Open(path string) error {
	fmt.Println("opening", path, "rw")
	return nil
}

func Close() {
	fmt.Println("closing")
}
"#;

    #[test]
    fn literal_matches_report_node_kind() {
        let matcher = PatternMatcher::new(SOURCE);
        let hits = matcher.find_all("\"closing\"").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, "interpreted_string_literal");
        assert!(matcher.find_all("\"missing\"").unwrap().is_empty());
    }

    #[test]
    fn integer_literals_by_kind() {
        let source = "package p\n\nconst limit = 64\n\nfunc f() int { return 64 + 1 }\n";
        let matcher = PatternMatcher::new(source);
        let hits = matcher.find_by_kind_and_text(&["int_literal"], "64");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.text == "64" && h.kind == "int_literal"));
    }

    #[test]
    fn literal_matches_carry_spans() {
        let matcher = PatternMatcher::new(SOURCE);
        let hits = matcher.find_all("\"rw\"").unwrap();
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert_eq!(&SOURCE[hit.byte_start..hit.byte_end], "\"rw\"");
        }
        assert!(matcher.find_all("  ").is_err());
    }

    #[test]
    fn literal_with_dollar_by_kind() {
        let source = "package p\n\nvar a = \"$HOME\"\nvar b = \"$HOME\"\n";
        let matcher = PatternMatcher::new(source);
        let hits = matcher.find_by_kind_and_text(&["interpreted_string_literal"], "\"$HOME\"");
        assert_eq!(hits.len(), 2);
        assert_eq!(matcher.source(), source);
    }
}
