use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitter parser wrapper for Go source code.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    /// Create a new Go parser.
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        // Get the tree-sitter Language from ast-grep-language
        let ts_lang = SupportLang::Go.get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet)?;

        Ok(Self { parser })
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Get all ERROR nodes in the tree.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        error_nodes(&self.tree)
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }

    /// Declared package name from the `package` clause, if any.
    pub fn package_name(&self) -> Option<&'a str> {
        package_name(self.root_node(), self.source)
    }
}

/// An ERROR or MISSING node: byte span plus 1-based line and column of its
/// start, the way `go vet` reports positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub missing: bool,
}

/// Collect every ERROR or MISSING node of an already parsed tree.
pub fn error_nodes(tree: &Tree) -> Vec<ErrorNode> {
    let mut errors = Vec::new();
    collect_error_nodes(tree.root_node(), &mut errors);
    errors
}

/// Declared package name of a parsed Go file.
///
/// tree-sitter-go exposes the name as a `package_identifier` child of
/// `package_clause` rather than as a field.
pub fn package_name<'s>(root: Node<'_>, source: &'s str) -> Option<&'s str> {
    let mut cursor = root.walk();
    let clause = root
        .children(&mut cursor)
        .find(|c| c.kind() == "package_clause")?;
    let mut inner = clause.walk();
    let ident = clause
        .children(&mut inner)
        .find(|c| c.kind() == "package_identifier" || c.kind() == "identifier")?;
    Some(&source[ident.byte_range()])
}

fn collect_error_nodes(node: Node<'_>, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        let start = node.start_position();
        errors.push(ErrorNode {
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
            line: start.row + 1,
            column: start.column + 1,
            missing: node.is_missing(),
        });
    }
    // Clean subtrees hold no error nodes.
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_go() {
        let mut parser = GoParser::new().unwrap();
        let source = "package main\n\nfunc main() { println(\"hello\") }\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(!parsed.has_errors());
        assert_eq!(parsed.root_node().kind(), "source_file");
        assert_eq!(parsed.package_name(), Some("main"));
    }

    #[test]
    fn parse_invalid_go() {
        let mut parser = GoParser::new().unwrap();
        let source = "package main\n\nfunc main( { }\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(parsed.has_errors());
        let errors = parsed.error_nodes();
        assert!(!errors.is_empty());
        assert_eq!(errors[0].line, 3);
    }

    #[test]
    fn missing_package_clause() {
        let mut parser = GoParser::new().unwrap();
        let parsed = parser.parse_with_source("func f() {}\n").unwrap();
        assert_eq!(parsed.package_name(), None);
    }
}
