use crate::plan::Change;
use crate::sg::matcher::PatternMatch;
use std::path::PathBuf;

/// New text for the span of one pattern match.
#[derive(Debug, Clone)]
pub struct Replacement {
    /// Byte range to replace
    pub byte_start: usize,
    pub byte_end: usize,
    /// Original text (for verification)
    pub original: String,
    /// New text
    pub replacement: String,
}

impl Replacement {
    /// Replace the entire matched region with `new_text`.
    pub fn of_match(m: &PatternMatch, new_text: impl Into<String>) -> Self {
        Self {
            byte_start: m.byte_start,
            byte_end: m.byte_end,
            original: m.text.clone(),
            replacement: new_text.into(),
        }
    }

    /// Convert into a plan Change against `file`.
    pub fn to_change(&self, file: impl Into<PathBuf>, description: impl Into<String>) -> Change {
        Change {
            file: file.into(),
            start: self.byte_start,
            end: self.byte_end,
            old_text: self.original.clone(),
            new_text: self.replacement.clone(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sg::PatternMatcher;

    const SOURCE: &str = "package p\n\nfunc f() {\n\tlog.Printf(\"a\", x)\n\tlog.Printf(\"b\", y)\n}\n";

    #[test]
    fn change_keeps_match_span() {
        let matcher = PatternMatcher::new(SOURCE);
        let hits = matcher.find_all("\"b\"").unwrap();
        assert_eq!(hits.len(), 1);
        let change = Replacement::of_match(&hits[0], "labelB").to_change("p/p.go", "constant reference");

        assert_eq!(&SOURCE[change.start..change.end], "\"b\"");
        assert_eq!(change.old_text, "\"b\"");
        assert_eq!(change.new_text, "labelB");
        assert_eq!(change.file, PathBuf::from("p/p.go"));
    }
}
