use crate::pool::with_parser;
use crate::ts::errors::TreeSitterError;
use crate::ts::parser::ErrorNode;

/// Validate that Go source code has no syntax errors.
///
/// Returns Ok(()) if the code parses without ERROR nodes.
pub fn validate_syntax(source: &str) -> Result<(), TreeSitterError> {
    let errors = with_parser(|parser| parser.parse_with_source(source).map(|p| p.error_nodes()))??;
    errors_to_result(&errors.iter().collect::<Vec<_>>())
}

/// Validate that rewriting `original` into `rewritten` doesn't introduce
/// syntax errors.
///
/// Errors already present in the original are tolerated; an error is "new"
/// when no original error has the same length and the same distance from the
/// end of the file (text before it may have shifted).
pub fn validate_rewrite(original: &str, rewritten: &str) -> Result<(), TreeSitterError> {
    let (original_errors, new_errors) = with_parser(|parser| {
        let before = parser.parse_with_source(original)?.error_nodes();
        let after = parser.parse_with_source(rewritten)?.error_nodes();
        Ok::<_, TreeSitterError>((before, after))
    })??;

    let introduced: Vec<&ErrorNode> = new_errors
        .iter()
        .filter(|e| {
            !original_errors.iter().any(|o| {
                o.byte_end - o.byte_start == e.byte_end - e.byte_start
                    && original.len() - o.byte_start == rewritten.len() - e.byte_start
            })
        })
        .collect();

    errors_to_result(&introduced)
}

fn errors_to_result(errors: &[&ErrorNode]) -> Result<(), TreeSitterError> {
    match errors {
        [] => Ok(()),
        [only] => Err(TreeSitterError::SyntaxError {
            byte_start: only.byte_start,
            byte_end: only.byte_end,
        }),
        many => Err(TreeSitterError::MultipleSyntaxErrors { count: many.len() }),
    }
}

/// Check if a code snippet is valid as a specific syntactic category.
pub fn validate_snippet(snippet: &str, category: SnippetCategory) -> Result<(), TreeSitterError> {
    let wrapped = match category {
        SnippetCategory::File => snippet.to_string(),
        SnippetCategory::FileBody => format!("package __wrapper__\n\n{snippet}\n"),
        SnippetCategory::FunctionBody => {
            format!("package __wrapper__\n\nfunc __wrapper__() {{\n{snippet}\n}}\n")
        }
        SnippetCategory::Expression => format!("package __wrapper__\n\nvar _ = {snippet}\n"),
    };

    validate_syntax(&wrapped)
}

/// Returns true when the snippet parses as any of the categories a generated
/// fragment may legitimately belong to.
pub fn parses_as_any(snippet: &str) -> bool {
    SnippetCategory::ALL
        .iter()
        .any(|category| validate_snippet(snippet, *category).is_ok())
}

/// Category of code snippet for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetCategory {
    /// A single expression
    Expression,
    /// A complete file including its package clause
    File,
    /// Statements inside a function body
    FunctionBody,
    /// Top-level declarations without a package clause
    FileBody,
}

impl SnippetCategory {
    pub const ALL: [SnippetCategory; 4] = [
        SnippetCategory::Expression,
        SnippetCategory::File,
        SnippetCategory::FunctionBody,
        SnippetCategory::FileBody,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_valid_syntax() {
        let source = r#"package main

func main() {
	println("hello")
}
"#;
        assert!(validate_syntax(source).is_ok());
    }

    #[test]
    fn validate_invalid_syntax() {
        let result = validate_syntax("package main\n\nfunc main( { }\n");
        assert!(result.is_err());
    }

    #[test]
    fn rewrite_introduces_error() {
        let source = "package p\n\nfunc foo() { x := 1; _ = x }\n";
        let broken = "package p\n\nfunc foo() { x := ; _ = x }\n";
        assert!(validate_rewrite(source, broken).is_err());
    }

    #[test]
    fn rewrite_keeps_valid_code() {
        let source = "package p\n\nfunc foo() { x := 1; _ = x }\n";
        let renamed = "package p\n\nfunc bar() { x := 1; _ = x }\n";
        assert!(validate_rewrite(source, renamed).is_ok());
    }

    #[test]
    fn declaration_snippets() {
        assert!(validate_snippet("func Helper() {}", SnippetCategory::FileBody).is_ok());
        assert!(validate_snippet("type T struct{ A int }", SnippetCategory::FileBody).is_ok());
        assert!(validate_snippet("func Helper( {", SnippetCategory::FileBody).is_err());
    }

    #[test]
    fn expression_snippets() {
        assert!(validate_snippet("1 + 2", SnippetCategory::Expression).is_ok());
        assert!(validate_snippet("foo.Bar(x)", SnippetCategory::Expression).is_ok());
        assert!(validate_snippet("1 +", SnippetCategory::Expression).is_err());
    }

    #[test]
    fn function_body_snippets() {
        assert!(validate_snippet("x := 1\nreturn x", SnippetCategory::FunctionBody).is_ok());
        assert!(validate_snippet("{\n\ty := 2\n\t_ = y\n}", SnippetCategory::FunctionBody).is_ok());
    }

    #[test]
    fn any_category() {
        assert!(parses_as_any("package util\n\nfunc Helper() {}\n"));
        assert!(parses_as_any("context.TODO()"));
        assert!(!parses_as_any("func ((("));
    }
}
