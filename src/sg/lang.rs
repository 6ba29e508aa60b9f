//! Go language support via ast-grep-language.
//!
//! The built-in `SupportLang::Go` handles metavariable preprocessing and the
//! tree-sitter grammar, so no custom `Language` implementation is needed.

pub use ast_grep_language::SupportLang;

/// Get the Go language for ast-grep operations.
pub fn go() -> SupportLang {
    SupportLang::Go
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_grep_core::AstGrep;

    #[test]
    fn go_lang_parses() {
        let sg = AstGrep::new("package main\n\nfunc main() {}\n", go());
        assert_eq!(sg.root().kind(), "source_file");
    }

    #[test]
    fn go_lang_literals() {
        let sg = AstGrep::new(
            "package main\n\nvar a = \"x\"\nvar b = \"x\"\nvar c = \"y\"\n",
            go(),
        );
        let hits: Vec<_> = sg.root().find_all("\"x\"").collect();
        assert_eq!(hits.len(), 2);
    }
}
