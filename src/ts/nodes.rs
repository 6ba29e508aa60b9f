//! Small helpers over tree-sitter-go nodes shared by the workspace model,
//! the resolver and the operations.

use tree_sitter::Node;

/// Source text covered by `node`.
pub fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// Named children of `node`, comments excluded.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// All children (named or not) of `node`.
pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Every child stored under field `field`.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Children paired with the field name they are stored under.
pub fn children_with_fields(node: Node<'_>) -> Vec<(Option<&'static str>, Node<'_>)> {
    (0..node.child_count())
        .filter_map(|i| {
            let child = node.child(i)?;
            Some((node.field_name_for_child(i as u32), child))
        })
        .collect()
}

/// True when an anonymous child token with text `token` is present.
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    children(node)
        .iter()
        .any(|c| !c.is_named() && c.kind() == token)
}

/// Children of `node` whose kind is `kind`, descending into the
/// `*_list` wrappers some grammar versions insert (`var_spec_list`,
/// `import_spec_list`, `statement_list`...).
pub fn specs<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    for child in named_children(node) {
        if child.kind() == kind {
            out.push(child);
        } else if child.kind().ends_with("_list") && child.kind() != "parameter_list" {
            out.extend(specs(child, kind));
        }
    }
    out
}

/// Statements of a `block`, flattening an optional `statement_list`.
pub fn block_statements(block: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    for child in named_children(block) {
        if child.kind() == "statement_list" {
            out.extend(named_children(child));
        } else {
            out.push(child);
        }
    }
    out
}

/// Nearest ancestor (or `node` itself) whose kind is one of `kinds`.
pub fn ancestor_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = Some(node);
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Smallest named node covering `[start, end)`.
pub fn covering_node(root: Node<'_>, start: usize, end: usize) -> Option<Node<'_>> {
    root.named_descendant_for_byte_range(start, end.max(start))
}

/// Collapse whitespace in a type spelling so that spellings from different
/// declarations compare equal. A single space survives only between two word
/// characters (`chan int`, `func(a int)`).
pub fn normalize_type(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut pending_space = false;
    for ch in spelling.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let prev_word = out
                .chars()
                .last()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if prev_word && (ch.is_alphanumeric() || ch == '_' || ch == '*' || ch == '[') {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_spacing() {
        assert_eq!(normalize_type("map[string] int"), "map[string]int");
        assert_eq!(normalize_type("chan   int"), "chan int");
        assert_eq!(normalize_type("func( a int ) error"), "func(a int)error");
        assert_eq!(normalize_type("[]byte"), "[]byte");
        assert_eq!(normalize_type("chan *T"), "chan *T");
    }
}
