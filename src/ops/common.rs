//! Helpers shared by the refactoring operations: identifier grammar,
//! import-declaration edits, declaration spans and qualifier scanning.

use crate::error::RefactorError;
use crate::plan::Change;
use crate::ts::nodes;
use crate::workspace::{FileId, SourceFile, Symbol, SymbolKind, Workspace};
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use tree_sitter::Node;

/// The 25 reserved words.
pub const KEYWORDS: [&str; 25] = [
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Letter or underscore first, then letters, digits or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Reject illegal identifiers and reserved words.
pub fn check_identifier(name: &str) -> Result<(), RefactorError> {
    if !is_valid_identifier(name) {
        return Err(RefactorError::invalid(format!(
            "'{name}' is not a valid identifier"
        )));
    }
    if is_keyword(name) {
        return Err(RefactorError::invalid(format!("'{name}' is a reserved word")));
    }
    Ok(())
}

/// File named by a workspace-relative path.
pub fn find_file(ws: &Workspace, spec: &str) -> Result<FileId, RefactorError> {
    ws.file_by_path(Path::new(spec.trim_start_matches("./")))
        .ok_or_else(|| {
            RefactorError::not_found(
                spec,
                "workspace files",
                ws.files().iter().map(|f| f.path.display().to_string()),
            )
        })
}

/// Accumulates import additions and removals for one file and renders them
/// as non-overlapping changes that respect the file's existing grouping.
pub struct ImportEditor<'f> {
    file: &'f SourceFile,
    adds: Vec<(String, Option<String>)>,
    removes: BTreeSet<String>,
}

impl<'f> ImportEditor<'f> {
    pub fn new(file: &'f SourceFile) -> Self {
        Self {
            file,
            adds: Vec::new(),
            removes: BTreeSet::new(),
        }
    }

    pub fn add(&mut self, path: &str, alias: Option<&str>) -> &mut Self {
        let present = self.file.imports.find(path).is_some() && !self.removes.contains(path);
        if !present && !self.adds.iter().any(|(p, _)| p == path) {
            self.adds.push((path.to_string(), alias.map(str::to_string)));
        }
        self
    }

    pub fn remove(&mut self, path: &str) -> &mut Self {
        self.adds.retain(|(p, _)| p != path);
        if self.file.imports.find(path).is_some() {
            self.removes.insert(path.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    pub fn file(&self) -> &'f SourceFile {
        self.file
    }

    pub fn removes(&self, path: &str) -> bool {
        self.removes.contains(path)
    }

    pub fn changes(&self) -> Vec<Change> {
        let file = self.file;
        let imports = &file.imports;
        let src = &file.source;
        let mut adds = self.adds.clone();
        adds.sort();
        let mut out = Vec::new();

        let render = |(path, alias): &(String, Option<String>)| match alias {
            Some(alias) => format!("{alias} \"{path}\""),
            None => format!("\"{path}\""),
        };

        // Declaration that receives additions.
        let grouped = imports.decls.iter().position(|d| d.grouped);
        let single = imports.decls.iter().position(|d| !d.grouped);
        let target = if adds.is_empty() {
            None
        } else {
            grouped.or(single)
        };

        for (idx, decl) in imports.decls.iter().enumerate() {
            let specs: Vec<_> = imports.specs_of(idx).collect();
            let kept: Vec<_> = specs
                .iter()
                .filter(|s| !self.removes.contains(&s.path))
                .collect();
            let receives = target == Some(idx);

            if !decl.grouped && receives && kept.len() + adds.len() == 1 {
                let only = match (kept.first(), adds.first()) {
                    (Some(spec), _) => src[spec.spec_range.clone()].to_string(),
                    (None, Some(add)) => render(add),
                    (None, None) => continue,
                };
                out.push(Change::span(
                    &file.path,
                    src,
                    decl.range.clone(),
                    format!("import {only}"),
                    "import",
                ));
                continue;
            }

            if !decl.grouped && receives {
                let mut body = String::from("import (\n");
                for spec in &kept {
                    body.push('\t');
                    body.push_str(&src[spec.spec_range.clone()]);
                    body.push('\n');
                }
                for add in &adds {
                    body.push('\t');
                    body.push_str(&render(add));
                    body.push('\n');
                }
                body.push(')');
                out.push(Change::span(&file.path, src, decl.range.clone(), body, "import"));
                continue;
            }

            if kept.is_empty() && !specs.is_empty() && !receives {
                let range = with_blank_before(src, full_lines(src, decl.range.clone()));
                out.push(Change::delete(&file.path, src, range, "import"));
                continue;
            }

            for spec in specs.iter().filter(|s| self.removes.contains(&s.path)) {
                let range = if decl.grouped {
                    own_line(src, spec.spec_range.clone())
                } else {
                    with_blank_before(src, full_lines(src, decl.range.clone()))
                };
                out.push(Change::delete(&file.path, src, range, "import"));
            }

            if receives {
                if let Some(close) = decl.close_paren {
                    let mut text = String::new();
                    if !src[..close].ends_with('\n') {
                        text.push('\n');
                    }
                    for add in &adds {
                        text.push('\t');
                        text.push_str(&render(add));
                        text.push('\n');
                    }
                    out.push(Change::insert(&file.path, close, text, "import"));
                }
            }
        }

        if target.is_none() && !adds.is_empty() {
            let text = match adds.as_slice() {
                [one] => format!("\n\nimport {}", render(one)),
                many => {
                    let lines: Vec<String> =
                        many.iter().map(|a| format!("\t{}\n", render(a))).collect();
                    format!("\n\nimport (\n{})", lines.concat())
                }
            };
            out.push(Change::insert(
                &file.path,
                imports.package_clause_end,
                text,
                "import",
            ));
        }
        out
    }
}

/// Stand-alone import declaration for a file that has none, followed by a
/// blank line.
pub fn import_block(imports: &[(String, Option<String>)]) -> String {
    let render = |(path, alias): &(String, Option<String>)| match alias {
        Some(alias) => format!("{alias} \"{path}\""),
        None => format!("\"{path}\""),
    };
    let mut sorted = imports.to_vec();
    sorted.sort();
    sorted.dedup_by(|a, b| a.0 == b.0);
    match sorted.as_slice() {
        [] => String::new(),
        [one] => format!("import {}\n\n", render(one)),
        many => {
            let lines: String = many.iter().map(|i| format!("\t{}\n", render(i))).collect();
            format!("import (\n{lines})\n\n")
        }
    }
}

pub fn within(range: &Range<usize>, spans: &[Range<usize>]) -> bool {
    spans
        .iter()
        .any(|s| s.start <= range.start && range.end <= s.end)
}

/// Queue removal of every import whose qualifier sites all fall inside
/// `dead` spans (deleted code or rewritten qualifiers).
pub fn prune_imports(ws: &Workspace, editor: &mut ImportEditor<'_>, dead: &[Range<usize>]) {
    prune_imports_except(ws, editor, dead, &BTreeSet::new());
}

/// [`prune_imports`], sparing the paths in `keep`.
pub fn prune_imports_except(
    ws: &Workspace,
    editor: &mut ImportEditor<'_>,
    dead: &[Range<usize>],
    keep: &BTreeSet<String>,
) {
    let file = editor.file;
    for spec in file
        .imports
        .specs
        .iter()
        .filter(|s| s.is_qualifying() && !keep.contains(&s.path))
    {
        let sites = qualifier_sites(file, &ws.import_local_name(spec));
        if !sites.is_empty() && sites.iter().all(|s| within(s, dead)) {
            editor.remove(&spec.path);
        }
    }
}

/// Expand `range` to whole lines, including the trailing newline.
pub fn full_lines(src: &str, range: Range<usize>) -> Range<usize> {
    let start = src[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let end = src[range.end..]
        .find('\n')
        .map_or(src.len(), |i| range.end + i + 1);
    start..end
}

/// Extend a whole-line deletion over the blank line in front of it when a
/// blank line also follows, so no doubled blank line is left behind.
fn with_blank_before(src: &str, range: Range<usize>) -> Range<usize> {
    if src[..range.start].ends_with("\n\n") && src[range.end..].starts_with('\n') {
        range.start - 1..range.end
    } else {
        range
    }
}

/// The whole line when `range` is the only thing on it (comments aside),
/// otherwise `range` itself.
pub fn own_line(src: &str, range: Range<usize>) -> Range<usize> {
    let lines = full_lines(src, range.clone());
    let before = &src[lines.start..range.start];
    let after = src[range.end..lines.end].trim();
    if before.trim().is_empty() && (after.is_empty() || after.starts_with("//")) {
        lines
    } else {
        range
    }
}

/// Top-level declaration of a symbol rendered as standalone source, plus
/// the span to delete when removing it.
#[derive(Debug, Clone)]
pub struct DeclSpan {
    /// Bytes to delete (doc comment and trailing newline included).
    pub removal: Range<usize>,
    /// Standalone declaration text with its doc comment.
    pub text: String,
    /// Span of the declaration proper (doc comment included).
    pub source_range: Range<usize>,
    /// Span of the declaration without its doc comment.
    pub body: Range<usize>,
    /// Keyword re-added when the spec is lifted out of a group.
    pub prefix: &'static str,
}

impl DeclSpan {
    /// Standalone text with `body_text` substituted for the declaration.
    pub fn render(&self, src: &str, body_text: &str) -> String {
        let docs = doc_lines(&src[self.source_range.start..self.body.start]);
        format!("{docs}{}{body_text}", self.prefix)
    }
}

/// Doc comment lines with their indentation dropped, newline-terminated.
fn doc_lines(docs: &str) -> String {
    docs.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("{l}\n"))
        .collect()
}

/// Locate the declaration of a top-level symbol or method.
pub fn decl_span(file: &SourceFile, sym: &Symbol) -> DeclSpan {
    let src = &file.source;
    let root = file.root();
    let spec = root
        .descendant_for_byte_range(sym.decl_range.start, sym.decl_range.end)
        .and_then(|n| {
            nodes::ancestor_of_kind(
                n,
                &[
                    "function_declaration",
                    "method_declaration",
                    "type_spec",
                    "type_alias",
                    "var_spec",
                    "const_spec",
                ],
            )
        });
    let (range, prefix) = match spec {
        Some(n) if matches!(n.kind(), "function_declaration" | "method_declaration") => {
            (n.byte_range(), "")
        }
        Some(n) => {
            let decl = nodes::ancestor_of_kind(
                n,
                &["type_declaration", "var_declaration", "const_declaration"],
            );
            match decl {
                Some(d) if !is_grouped(d) => (d.byte_range(), ""),
                _ => (n.byte_range(), keyword_for(sym.kind)),
            }
        }
        None => (sym.decl_range.clone(), ""),
    };

    let doc_start = doc_comment_start(src, range.start);
    let body = &src[range.start..range.end];
    let docs = doc_lines(&src[doc_start..range.start]);
    let text = format!("{docs}{prefix}{body}");
    let mut removal = full_lines(src, doc_start..range.end);
    // Swallow one blank separator line so deletions do not pile up blanks.
    if src[removal.end..].starts_with('\n') {
        removal.end += 1;
    } else if removal.end == src.len() && src[..removal.start].ends_with("\n\n") {
        removal.start -= 1;
    }
    DeclSpan {
        removal,
        text,
        source_range: doc_start..range.end,
        body: range,
        prefix,
    }
}

fn keyword_for(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Type | SymbolKind::Interface => "type ",
        SymbolKind::Variable => "var ",
        SymbolKind::Constant => "const ",
        _ => "",
    }
}

fn is_grouped(decl: Node<'_>) -> bool {
    nodes::has_token(decl, "(")
        || nodes::named_children(decl)
            .iter()
            .any(|c| c.kind().ends_with("_list") && nodes::has_token(*c, "("))
}

/// Start of the comment block directly above `decl_start`, or `decl_start`
/// itself when there is none.
pub fn doc_comment_start(src: &str, decl_start: usize) -> usize {
    let mut start = src[..decl_start].rfind('\n').map_or(0, |i| i + 1);
    if !src[start..decl_start].trim().is_empty() {
        return decl_start;
    }
    let mut found = false;
    while start > 0 {
        let prev_end = start - 1;
        let prev_start = src[..prev_end].rfind('\n').map_or(0, |i| i + 1);
        let line = src[prev_start..prev_end].trim();
        if line.starts_with("//") || (line.starts_with("/*") && line.ends_with("*/")) {
            start = prev_start;
            found = true;
        } else {
            break;
        }
    }
    if found {
        start
    } else {
        decl_start
    }
}

/// Merge deletion ranges; a run reaching the end of the file also takes
/// the blank line in front of it.
pub fn tidy_removals(src: &str, ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut merged = merge_ranges(ranges);
    if let Some(last) = merged.last_mut() {
        if last.end == src.len() && last.start > 0 && src[..last.start].ends_with("\n\n") {
            last.start -= 1;
        }
    }
    merged
}

/// Merge adjacent or overlapping deletion ranges.
pub fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| r.start);
    let mut out: Vec<Range<usize>> = Vec::new();
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => out.push(r),
        }
    }
    out
}

/// Spans of `name.X` qualifiers in a file: selector operands and qualified
/// type packages spelled `name`.
pub fn qualifier_sites(file: &SourceFile, name: &str) -> Vec<Range<usize>> {
    let src = &file.source;
    let mut out = Vec::new();
    let mut stack = vec![file.root()];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_declaration" | "package_clause" => continue,
            "selector_expression" => {
                if let Some(op) = node.child_by_field_name("operand") {
                    if op.kind() == "identifier" && nodes::text(op, src) == name {
                        out.push(op.byte_range());
                    }
                }
            }
            "qualified_type" => {
                if let Some(pkg) = node.child_by_field_name("package") {
                    if nodes::text(pkg, src) == name {
                        out.push(pkg.byte_range());
                    }
                }
            }
            _ => {}
        }
        stack.extend(nodes::named_children(node));
    }
    out.sort_by_key(|r| r.start);
    out.dedup();
    out
}

/// Names declared at file or package level that `file` already binds:
/// import names plus the package's top-level symbols.
pub fn bound_names(ws: &Workspace, file: &SourceFile) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = ws
        .package(file.package)
        .symbols
        .top_level_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
        names.insert(ws.import_local_name(spec));
    }
    names
}

/// Leading whitespace of the line holding `offset`.
pub fn indentation_at(src: &str, offset: usize) -> &str {
    let start = src[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &src[start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

/// Re-indent every line of `text` after the first with `indent`.
pub fn reindent(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// Smallest named node exactly covering `range`, if any.
pub fn node_at<'t>(root: Node<'t>, range: Range<usize>) -> Option<Node<'t>> {
    let mut node = root.descendant_for_byte_range(range.start, range.end)?;
    while node.byte_range() != range {
        node = node.parent()?;
        if node.start_byte() < range.start || node.end_byte() > range.end {
            return None;
        }
    }
    Some(node)
}

/// Identifiers the statements assign to (`x = ...`, `x += ...`, `x++`).
pub fn assigned_names(src: &str, stmts: &[Node<'_>]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut stack: Vec<Node<'_>> = stmts.to_vec();
    while let Some(node) = stack.pop() {
        let targets = match node.kind() {
            "assignment_statement" => node
                .child_by_field_name("left")
                .map(|l| {
                    if l.kind() == "expression_list" {
                        nodes::named_children(l)
                    } else {
                        vec![l]
                    }
                })
                .unwrap_or_default(),
            "inc_statement" | "dec_statement" => {
                nodes::named_children(node).into_iter().take(1).collect()
            }
            _ => Vec::new(),
        };
        for t in targets.into_iter().filter(|t| t.kind() == "identifier") {
            out.insert(nodes::text(t, src).to_string());
        }
        stack.extend(nodes::named_children(node));
    }
    out
}

/// How an occurrence at `node` writes to the variable it names, if it does:
/// as an assignment target, an increment, or an address-of operand.
pub fn mutation(node: Node<'_>) -> Option<&'static str> {
    let parent = node.parent()?;
    match parent.kind() {
        "inc_statement" | "dec_statement" => Some("incremented"),
        "unary_expression" if nodes::has_token(parent, "&") => Some("address-taken"),
        "assignment_statement" if parent.child_by_field_name("left") == Some(node) => {
            Some("reassigned")
        }
        "expression_list" => {
            let stmt = parent.parent()?;
            (stmt.kind() == "assignment_statement"
                && stmt.child_by_field_name("left") == Some(parent))
            .then_some("reassigned")
        }
        _ => None,
    }
}

/// Edits of one file computed inner-first. An outer edit reads its
/// sub-spans through [`PendingEdits::text`], which folds in (and consumes)
/// the edits already recorded inside them.
#[derive(Debug, Default)]
pub struct PendingEdits {
    edits: Vec<(Range<usize>, String, String)>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        range: Range<usize>,
        text: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.edits.push((range, text.into(), description.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Source text of `range` with every pending edit inside it applied.
    pub fn text(&mut self, src: &str, range: Range<usize>) -> String {
        let inside = |r: &Range<usize>| {
            r.start >= range.start
                && r.end <= range.end
                && !(r.is_empty() && r.start == range.end && !range.is_empty())
        };
        let (mut inner, rest): (Vec<_>, Vec<_>) =
            self.edits.drain(..).partition(|(r, _, _)| inside(r));
        self.edits = rest;
        inner.sort_by(|a, b| b.0.start.cmp(&a.0.start).then(b.0.end.cmp(&a.0.end)));
        let mut out = src[range.clone()].to_string();
        for (r, text, _) in inner {
            out.replace_range(r.start - range.start..r.end - range.start, &text);
        }
        out
    }

    pub fn into_changes(self, path: &std::path::Path, src: &str) -> Vec<Change> {
        self.edits
            .into_iter()
            .map(|(r, text, desc)| Change::span(path, src, r, text, desc))
            .collect()
    }
}

/// The call expression an identifier occurrence is the callee of: `f(...)`,
/// `pkg.f(...)` or `x.m(...)`. Only the selector's field is inspected, so a
/// closure containing the call is never mistaken for it.
pub fn call_of<'t>(root: Node<'t>, offset: usize, len: usize) -> Option<Node<'t>> {
    let ident = root.descendant_for_byte_range(offset, offset + len)?;
    let parent = ident.parent()?;
    let callee = match parent.kind() {
        "selector_expression" if parent.child_by_field_name("field") == Some(ident) => parent,
        "call_expression" => ident,
        _ => return None,
    };
    let call = callee.parent()?;
    (call.kind() == "call_expression" && call.child_by_field_name("function") == Some(callee))
        .then_some(call)
}

/// Expression kinds that bind looser than a selector or call.
pub fn needs_parens(kind: &str) -> bool {
    matches!(
        kind,
        "binary_expression" | "unary_expression" | "func_literal" | "type_assertion_expression"
    ) || kind.ends_with("_type")
}

/// Whether a node sitting where `site` sits may be replaced by any
/// expression without parentheses.
pub fn is_loose_site(site: Node<'_>) -> bool {
    site.parent().map_or(true, |p| {
        matches!(
            p.kind(),
            "argument_list"
                | "expression_list"
                | "parenthesized_expression"
                | "expression_statement"
                | "literal_element"
                | "return_statement"
                | "var_spec"
                | "const_spec"
                | "send_statement"
                | "block"
                | "statement_list"
        )
    })
}

/// `text` parenthesized when an expression of `kind` replaces `site`.
pub fn wrap_for_site(text: &str, kind: &str, site: Node<'_>) -> String {
    if needs_parens(kind) && !is_loose_site(site) {
        format!("({text})")
    } else {
        text.to_string()
    }
}

/// One function-local binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub name: String,
    pub offset: usize,
    /// Declared or inferred type spelling.
    pub ty: Option<String>,
}

/// Local bindings and identifier uses inside one function declaration.
#[derive(Debug, Clone, Default)]
pub struct LocalScan {
    pub decls: Vec<LocalDecl>,
    /// `(name, offset)` of every identifier that is not a binding site.
    pub uses: Vec<(String, usize)>,
}

impl LocalScan {
    pub fn of(ws: &Workspace, file: &SourceFile, func: Node<'_>) -> Self {
        let mut scan = LocalScan::default();
        let src = &file.source;
        let mut stack = vec![func];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "parameter_declaration" | "variadic_parameter_declaration" => {
                    let variadic = node.kind() == "variadic_parameter_declaration";
                    let ty = node.child_by_field_name("type").map(|t| {
                        let spelled = nodes::text(t, src);
                        if variadic {
                            format!("[]{spelled}")
                        } else {
                            spelled.to_string()
                        }
                    });
                    for name in nodes::field_children(node, "name") {
                        scan.declare(name, src, ty.clone());
                    }
                    if let Some(t) = node.child_by_field_name("type") {
                        stack.push(t);
                    }
                    continue;
                }
                "var_spec" | "const_spec" => {
                    let declared = node
                        .child_by_field_name("type")
                        .map(|t| nodes::text(t, src).to_string());
                    let values = node
                        .child_by_field_name("value")
                        .map(nodes::named_children)
                        .unwrap_or_default();
                    for (idx, name) in nodes::field_children(node, "name").into_iter().enumerate() {
                        let ty = declared
                            .clone()
                            .or_else(|| values.get(idx).and_then(|v| scan.infer(ws, file, *v)));
                        scan.declare(name, src, ty);
                    }
                    if let Some(v) = node.child_by_field_name("value") {
                        stack.push(v);
                    }
                    continue;
                }
                "short_var_declaration" | "range_clause" | "receive_statement" => {
                    let left = node.child_by_field_name("left");
                    let right = node.child_by_field_name("right");
                    let defines = node.kind() == "short_var_declaration" || nodes::has_token(node, ":=");
                    if let (Some(left), true) = (left, defines) {
                        let values = right
                            .filter(|_| node.kind() == "short_var_declaration")
                            .map(|r| {
                                if r.kind() == "expression_list" {
                                    nodes::named_children(r)
                                } else {
                                    vec![r]
                                }
                            })
                            .unwrap_or_default();
                        let names = if left.kind() == "expression_list" {
                            nodes::named_children(left)
                        } else {
                            vec![left]
                        };
                        for (idx, name) in names.into_iter().enumerate() {
                            if name.kind() != "identifier" {
                                stack.push(name);
                                continue;
                            }
                            let ty = if values.len() == 1 && idx > 0 {
                                None
                            } else {
                                values.get(idx).and_then(|v| scan.infer(ws, file, *v))
                            };
                            scan.declare(name, src, ty);
                        }
                        if let Some(r) = right {
                            stack.push(r);
                        }
                        continue;
                    }
                }
                "type_switch_statement" => {
                    if let Some(alias) = node.child_by_field_name("alias") {
                        for name in if alias.kind() == "expression_list" {
                            nodes::named_children(alias)
                        } else {
                            vec![alias]
                        } {
                            scan.declare(name, src, None);
                        }
                    }
                    for child in nodes::named_children(node) {
                        if Some(child) != node.child_by_field_name("alias") {
                            stack.push(child);
                        }
                    }
                    continue;
                }
                "identifier" => {
                    scan.uses.push((nodes::text(node, src).to_string(), node.start_byte()));
                    continue;
                }
                "selector_expression" => {
                    if let Some(op) = node.child_by_field_name("operand") {
                        stack.push(op);
                    }
                    continue;
                }
                _ => {}
            }
            stack.extend(nodes::named_children(node));
        }
        scan.decls.sort_by_key(|d| d.offset);
        scan.uses.sort_by_key(|u| u.1);
        scan
    }

    fn declare(&mut self, name: Node<'_>, src: &str, ty: Option<String>) {
        let text = nodes::text(name, src);
        if text != "_" {
            self.decls.push(LocalDecl {
                name: text.to_string(),
                offset: name.start_byte(),
                ty,
            });
        }
    }

    /// Best-effort type spelling of an initializer.
    fn infer(&self, ws: &Workspace, file: &SourceFile, value: Node<'_>) -> Option<String> {
        let src = &file.source;
        match value.kind() {
            "composite_literal" => value
                .child_by_field_name("type")
                .map(|t| nodes::text(t, src).to_string()),
            "unary_expression" => {
                let operand = value.child_by_field_name("operand")?;
                let inner = self.infer(ws, file, operand)?;
                nodes::has_token(value, "&").then(|| format!("*{inner}"))
            }
            "interpreted_string_literal" | "raw_string_literal" => Some("string".into()),
            "int_literal" => Some("int".into()),
            "float_literal" => Some("float64".into()),
            "rune_literal" => Some("rune".into()),
            "true" | "false" => Some("bool".into()),
            "parenthesized_expression" => nodes::named_children(value)
                .into_iter()
                .next()
                .and_then(|inner| self.infer(ws, file, inner)),
            "identifier" => {
                let name = nodes::text(value, src);
                self.decls
                    .iter()
                    .rev()
                    .find(|d| d.name == name && d.offset < value.start_byte())
                    .and_then(|d| d.ty.clone())
            }
            "call_expression" => {
                let function = value.child_by_field_name("function")?;
                let args = value.child_by_field_name("arguments");
                let name = nodes::text(function, src);
                if name == "new" {
                    let ty = args.and_then(|a| nodes::named_children(a).into_iter().next())?;
                    return Some(format!("*{}", nodes::text(ty, src)));
                }
                let table = &ws.package(file.package).symbols;
                if function.kind() == "identifier" {
                    if table.types.contains_key(name) {
                        return Some(name.to_string());
                    }
                    let func = ws.symbol(*table.functions.get(name)?);
                    let sig = func.signature.as_ref()?;
                    return match sig.results.as_slice() {
                        [only] => Some(only.ty.clone()),
                        _ => None,
                    };
                }
                None
            }
            _ => None,
        }
    }

    /// Nearest binding of `name` that precedes `offset`.
    pub fn binding_before(&self, name: &str, offset: usize) -> Option<&LocalDecl> {
        self.decls
            .iter()
            .rev()
            .find(|d| d.name == name && d.offset < offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;
    use proptest::prelude::*;
    use std::path::Path;

    fn apply(src: &str, mut changes: Vec<Change>) -> String {
        crate::plan::sort_changes(&mut changes);
        let mut out = src.to_string();
        for c in changes {
            out.replace_range(c.start..c.end, &c.new_text);
        }
        out
    }

    fn file_ws(src: &str) -> Workspace {
        Workspace::from_sources("/ws", None, &[("p/p.go", src)]).unwrap()
    }

    fn edit(src: &str, f: impl FnOnce(&mut ImportEditor<'_>)) -> String {
        let ws = file_ws(src);
        let id = ws.file_by_path(Path::new("p/p.go")).unwrap();
        let mut editor = ImportEditor::new(ws.file(id));
        f(&mut editor);
        apply(src, editor.changes())
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(KEYWORDS.len(), 25);
        assert!(check_identifier("range").is_err());
        assert!(check_identifier("9lives").is_err());
        assert!(check_identifier("_ok").is_ok());
        assert!(check_identifier("naïve").is_ok());
    }

    #[test]
    fn single_import_becomes_grouped() {
        let out = edit("package p\n\nimport \"fmt\"\n\nvar _ = fmt.Sprint\n", |e| {
            e.add("strings", None);
        });
        assert_eq!(
            out,
            "package p\n\nimport (\n\t\"fmt\"\n\t\"strings\"\n)\n\nvar _ = fmt.Sprint\n"
        );
    }

    #[test]
    fn grouped_import_appends_before_paren() {
        let out = edit("package p\n\nimport (\n\t\"fmt\"\n)\n", |e| {
            e.add("example.com/m/util", None);
        });
        assert_eq!(
            out,
            "package p\n\nimport (\n\t\"fmt\"\n\t\"example.com/m/util\"\n)\n"
        );
    }

    #[test]
    fn no_imports_inserts_after_package_clause() {
        let out = edit("package p\n\nfunc F() {}\n", |e| {
            e.add("context", None);
        });
        assert_eq!(out, "package p\n\nimport \"context\"\n\nfunc F() {}\n");
    }

    #[test]
    fn removal_drops_the_line() {
        let out = edit("package p\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n", |e| {
            e.remove("os");
        });
        assert_eq!(out, "package p\n\nimport (\n\t\"fmt\"\n)\n");
        let out = edit("package p\n\nimport \"os\"\n\nfunc F() {}\n", |e| {
            e.remove("os");
        });
        assert_eq!(out, "package p\n\nfunc F() {}\n");
        let out = edit("package p\n\nimport \"os\"\nfunc F() {}\n", |e| {
            e.remove("os");
        });
        assert_eq!(out, "package p\n\nfunc F() {}\n");
    }

    #[test]
    fn decl_span_includes_doc_comment() {
        let src = "package p\n\n// Helper helps.\n// Really.\nfunc Helper() {}\n\nfunc Other() {}\n";
        let ws = file_ws(src);
        let id = ws.file_by_path(Path::new("p/p.go")).unwrap();
        let pkg = ws.file(id).package;
        let helper = ws.symbol(ws.package(pkg).symbols.functions["Helper"]);
        let span = decl_span(ws.file(id), helper);
        assert_eq!(span.text, "// Helper helps.\n// Really.\nfunc Helper() {}");
        let mut rest = src.to_string();
        rest.replace_range(span.removal, "");
        assert_eq!(rest, "package p\n\nfunc Other() {}\n");
    }

    #[test]
    fn grouped_spec_gets_keyword() {
        let src = "package p\n\ntype (\n\tA int\n\tB string\n)\n";
        let ws = file_ws(src);
        let id = ws.file_by_path(Path::new("p/p.go")).unwrap();
        let pkg = ws.file(id).package;
        let b = ws.symbol(ws.package(pkg).symbols.types["B"]);
        assert_eq!(decl_span(ws.file(id), b).text, "type B string");
    }

    #[test]
    fn qualifier_scan() {
        let src = "package p\n\nimport \"strings\"\n\nvar b strings.Builder\n\nvar _ = strings.ToUpper(\"x\")\n";
        let ws = file_ws(src);
        let id = ws.file_by_path(Path::new("p/p.go")).unwrap();
        let sites = qualifier_sites(ws.file(id), "strings");
        assert_eq!(sites.len(), 2);
        for s in sites {
            assert_eq!(&src[s], "strings");
        }
    }

    proptest! {
        #[test]
        fn identifier_grammar(name in "[a-zA-Z_][a-zA-Z0-9_]{0,12}") {
            prop_assert!(is_valid_identifier(&name));
        }

        #[test]
        fn leading_digit_rejected(name in "[0-9][a-zA-Z0-9_]{0,12}") {
            prop_assert!(!is_valid_identifier(&name));
        }

        #[test]
        fn merged_ranges_are_disjoint(raw in proptest::collection::vec((0usize..100, 0usize..20), 0..12)) {
            let ranges = raw.into_iter().map(|(s, l)| s..s + l).collect();
            let merged = merge_ranges(ranges);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }
    }
}
