//! Extract operations: statements into a function or method, an
//! expression into a local variable, a literal into a constant, and a
//! type's method set into an interface.

use crate::error::RefactorError;
use crate::ops::common::{
    assigned_names, check_identifier, find_file, indentation_at, node_at, ImportEditor, LocalDecl,
    LocalScan,
};
use crate::ops::transplant::Transplant;
use crate::ops::{Context, Operation, OperationKind, Scope};
use crate::plan::{Change, ImportEdge, Issue, IssueKind, Plan};
use crate::sg::{PatternMatch, PatternMatcher, Replacement};
use crate::ts::nodes;
use crate::workspace::symbols::receiver_type;
use crate::workspace::{FileId, PackageId, SourceFile, SymbolId, SymbolKind, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::debug;
use tree_sitter::Node;

/// Node kinds that open a scope below a block.
const SCOPES: [&str; 11] = [
    "block",
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
    "func_literal",
    "expression_case",
    "type_case",
    "default_case",
    "communication_case",
];

const LITERAL_KINDS: [&str; 6] = [
    "interpreted_string_literal",
    "raw_string_literal",
    "int_literal",
    "float_literal",
    "imaginary_literal",
    "rune_literal",
];

/// Move whole statements into a new package-level function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFunction {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub name: String,
}

/// Move whole statements of a method into a new method on the same
/// receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractMethod {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub name: String,
}

struct Receiver {
    name: String,
    /// `(c *Cart)` as written.
    text: String,
    type_name: String,
}

struct Output {
    name: String,
    ty: String,
    /// An outer variable the selection assigns and later code reads.
    reassigned: bool,
}

/// Statements lifted out of a function body.
struct Extraction {
    file: FileId,
    package: PackageId,
    range: Range<usize>,
    func_end: usize,
    indent: String,
    /// Statements re-indented for the new body.
    body: String,
    receiver: Option<Receiver>,
    params: Vec<(String, String)>,
    results: Vec<Output>,
    /// Names whose type could not be inferred.
    untyped: Vec<String>,
}

impl Extraction {
    fn analyze(
        ws: &Workspace,
        file_spec: &str,
        start_line: usize,
        end_line: usize,
        method: bool,
    ) -> Result<Self, RefactorError> {
        let file_id = find_file(ws, file_spec)?;
        let file = ws.file(file_id);
        let src = &file.source;
        let (block, stmts, range) = select_statements(file, start_line, end_line)?;
        check_control_flow(file, &stmts, &range)?;

        let func = nodes::ancestor_of_kind(block, &["function_declaration", "method_declaration"])
            .ok_or_else(|| {
                RefactorError::invalid("selection is not inside a function")
                    .at(&file.path, Some(start_line))
            })?;

        let receiver = if method {
            if func.kind() != "method_declaration" {
                return Err(RefactorError::invalid(
                    "extract-method needs a selection inside a method",
                )
                .at(&file.path, Some(start_line)));
            }
            Some(read_receiver(func, src).ok_or_else(|| {
                RefactorError::invalid("the enclosing method has an unnamed receiver")
                    .at(&file.path, Some(start_line))
            })?)
        } else {
            None
        };
        let receiver_offset = receiver.as_ref().and_then(|_| {
            let list = func.child_by_field_name("receiver")?;
            let param = nodes::named_children(list).into_iter().next()?;
            param.child_by_field_name("name").map(|n| n.start_byte())
        });

        let scan = LocalScan::of(ws, file, func);
        let mut params: Vec<&LocalDecl> = Vec::new();
        for (name, offset) in &scan.uses {
            if !range.contains(offset) {
                continue;
            }
            let Some(binding) = scan.binding_before(name, *offset) else {
                continue;
            };
            if binding.offset >= range.start || Some(binding.offset) == receiver_offset {
                continue;
            }
            if !params.iter().any(|p| p.offset == binding.offset) {
                params.push(binding);
            }
        }

        let used_after = |d: &LocalDecl| {
            scan.uses.iter().any(|(n, off)| {
                *off >= range.end
                    && *n == d.name
                    && scan.binding_before(n, *off).map(|b| b.offset) == Some(d.offset)
            })
        };
        let root = file.root();
        let mut untyped = Vec::new();
        let mut typed = |d: &LocalDecl| match &d.ty {
            Some(ty) => ty.clone(),
            None => {
                if !untyped.contains(&d.name) {
                    untyped.push(d.name.clone());
                }
                "any".to_string()
            }
        };

        let mut results: Vec<Output> = Vec::new();
        for d in scan.decls.iter().filter(|d| range.contains(&d.offset)) {
            if results.iter().any(|r| r.name == d.name) {
                continue;
            }
            if declared_in(root, block, d.offset) && used_after(d) {
                results.push(Output {
                    name: d.name.clone(),
                    ty: typed(d),
                    reassigned: false,
                });
            }
        }
        let assigned = assigned_names(src, &stmts);
        for p in &params {
            if assigned.contains(&p.name) && used_after(*p) {
                results.push(Output {
                    name: p.name.clone(),
                    ty: typed(*p),
                    reassigned: true,
                });
            }
        }
        let params = params.iter().map(|p| (p.name.clone(), typed(*p))).collect();

        let indent = indentation_at(src, range.start).to_string();
        let body = rebase(&format!("{indent}{}", &src[range.clone()]), &indent);
        Ok(Self {
            file: file_id,
            package: file.package,
            range,
            func_end: func.end_byte(),
            indent,
            body,
            receiver,
            params,
            results,
            untyped,
        })
    }

    fn declaration(&self, name: &str) -> String {
        let recv = self
            .receiver
            .as_ref()
            .map(|r| format!("{} ", r.text))
            .unwrap_or_default();
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(n, ty)| format!("{n} {ty}"))
            .collect();
        let results = match self.results.as_slice() {
            [] => String::new(),
            [one] => format!(" {}", one.ty),
            many => {
                let types: Vec<&str> = many.iter().map(|o| o.ty.as_str()).collect();
                format!(" ({})", types.join(", "))
            }
        };
        let mut body = self.body.clone();
        if !self.results.is_empty() {
            let names: Vec<&str> = self.results.iter().map(|o| o.name.as_str()).collect();
            body.push_str(&format!("\n\treturn {}", names.join(", ")));
        }
        format!(
            "func {recv}{name}({}){results} {{\n{body}\n}}",
            params.join(", ")
        )
    }

    fn call(&self, name: &str) -> String {
        let callee = match &self.receiver {
            Some(r) => format!("{}.{name}", r.name),
            None => name.to_string(),
        };
        let args: Vec<&str> = self.params.iter().map(|(n, _)| n.as_str()).collect();
        let call = format!("{callee}({})", args.join(", "));
        let names: Vec<&str> = self.results.iter().map(|o| o.name.as_str()).collect();
        let fresh: Vec<&Output> = self.results.iter().filter(|o| !o.reassigned).collect();
        let reassigned = self.results.iter().any(|o| o.reassigned);
        match (fresh.is_empty(), reassigned) {
            (true, false) => call,
            (false, false) => format!("{} := {call}", names.join(", ")),
            (true, true) => format!("{} = {call}", names.join(", ")),
            (false, true) => {
                let decls: String = fresh
                    .iter()
                    .map(|o| format!("var {} {}\n{}", o.name, o.ty, self.indent))
                    .collect();
                format!("{decls}{} = {call}", names.join(", "))
            }
        }
    }

    fn plan(&self, cx: &Context<'_>, mut plan: Plan, name: &str, what: &str) -> Plan {
        let ws = cx.ws;
        let file = ws.file(self.file);
        plan.touch_package(ws.package(self.package).import_path.clone());
        plan.push(Change::span(
            &file.path,
            &file.source,
            self.range.clone(),
            self.call(name),
            "call",
        ));
        plan.push(Change::insert(
            &file.path,
            self.func_end,
            format!("\n\n{}", self.declaration(name)),
            format!("extract {what} {name}"),
        ));
        for local in &self.untyped {
            plan.add_issue(
                Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!("type of {local} could not be inferred; typed as any"),
                )
                .at(&file.path, Some(file.line_of(self.range.start))),
            );
        }
        debug!(
            name,
            params = self.params.len(),
            results = self.results.len(),
            "extraction planned"
        );
        plan
    }
}

fn read_receiver(method: Node<'_>, src: &str) -> Option<Receiver> {
    let list = method.child_by_field_name("receiver")?;
    let param = nodes::named_children(list).into_iter().next()?;
    let name = param.child_by_field_name("name")?;
    let (type_name, _) = receiver_type(method, src)?;
    Some(Receiver {
        name: nodes::text(name, src).to_string(),
        text: nodes::text(list, src).to_string(),
        type_name,
    })
}

/// Innermost block whose statements the line range covers completely,
/// with those statements and their span.
fn select_statements<'t>(
    file: &'t SourceFile,
    start_line: usize,
    end_line: usize,
) -> Result<(Node<'t>, Vec<Node<'t>>, Range<usize>), RefactorError> {
    let partial = || {
        RefactorError::invalid(format!(
            "lines {start_line}-{end_line} do not select whole statements"
        ))
        .at(&file.path, Some(start_line))
    };
    if start_line == 0 || end_line < start_line {
        return Err(RefactorError::invalid(format!(
            "invalid line range {start_line}-{end_line}"
        )));
    }
    let (Some(start), Some(end)) = (file.line_start(start_line), file.line_end(end_line)) else {
        return Err(RefactorError::invalid(format!(
            "lines {start_line}-{end_line} are outside {}",
            file.path.display()
        )));
    };
    let text = &file.source[start..end];
    if text.trim().is_empty() {
        return Err(partial());
    }
    let inner_start = start + (text.len() - text.trim_start().len());
    let inner_end = end - (text.len() - text.trim_end().len());

    let mut node = nodes::covering_node(file.root(), inner_start, inner_end).ok_or_else(partial)?;
    loop {
        if node.kind() == "block" {
            let stmts: Vec<Node<'t>> = nodes::block_statements(node)
                .into_iter()
                .filter(|s| s.start_byte() < inner_end && s.end_byte() > inner_start)
                .collect();
            let whole = stmts
                .iter()
                .all(|s| s.start_byte() >= inner_start && s.end_byte() <= inner_end);
            return match (stmts.first(), stmts.last()) {
                (Some(first), Some(last)) if whole => {
                    let range = first.start_byte()..last.end_byte();
                    Ok((node, stmts, range))
                }
                _ => Err(partial()),
            };
        }
        if matches!(
            node.kind(),
            "function_declaration" | "method_declaration" | "source_file"
        ) {
            return Err(partial());
        }
        node = node.parent().ok_or_else(partial)?;
    }
}

/// Reject statements that transfer control out of the selection.
fn check_control_flow(
    file: &SourceFile,
    stmts: &[Node<'_>],
    range: &Range<usize>,
) -> Result<(), RefactorError> {
    let mut stack: Vec<Node<'_>> = stmts.to_vec();
    while let Some(node) = stack.pop() {
        let labeled = || !nodes::named_children(node).is_empty();
        let escapes = match node.kind() {
            "func_literal" => continue,
            "return_statement" | "goto_statement" | "fallthrough_statement" => true,
            "break_statement" => {
                labeled()
                    || !enclosed_by(
                        node,
                        range,
                        &[
                            "for_statement",
                            "expression_switch_statement",
                            "type_switch_statement",
                            "select_statement",
                        ],
                    )
            }
            "continue_statement" => labeled() || !enclosed_by(node, range, &["for_statement"]),
            _ => false,
        };
        if escapes {
            return Err(RefactorError::invalid(format!(
                "selection contains a {} statement",
                node.kind().trim_end_matches("_statement")
            ))
            .at(&file.path, Some(file.line_of(node.start_byte()))));
        }
        stack.extend(nodes::named_children(node));
    }
    Ok(())
}

/// Whether an ancestor of `node` inside `range` has one of `kinds`.
fn enclosed_by(node: Node<'_>, range: &Range<usize>, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(p) = current {
        if p.start_byte() < range.start {
            return false;
        }
        if kinds.contains(&p.kind()) {
            return true;
        }
        current = p.parent();
    }
    false
}

/// The binding at `offset` lives directly in `block`, not in a nested scope.
fn declared_in(root: Node<'_>, block: Node<'_>, offset: usize) -> bool {
    let Some(mut node) = root.descendant_for_byte_range(offset, offset + 1) else {
        return false;
    };
    while let Some(parent) = node.parent() {
        if parent == block {
            return true;
        }
        if SCOPES.contains(&parent.kind()) {
            return false;
        }
        node = parent;
    }
    false
}

/// Strip `indent` from every line and indent one tab instead.
fn rebase(text: &str, indent: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("\t{}", line.strip_prefix(indent).unwrap_or(line))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Operation for ExtractFunction {
    fn kind(&self) -> OperationKind {
        OperationKind::ExtractFunction
    }

    fn describe(&self) -> String {
        format!(
            "extract {}:{}-{} into function {}",
            self.file, self.start_line, self.end_line, self.name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.name)?;
        let ex = Extraction::analyze(cx.ws, &self.file, self.start_line, self.end_line, false)?;
        let pkg = cx.ws.package(ex.package);
        if pkg.symbols.lookup(&self.name).is_some() {
            return Err(RefactorError::conflict(
                &self.name,
                format!("package {}", pkg.import_path),
            ));
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ex = Extraction::analyze(cx.ws, &self.file, self.start_line, self.end_line, false)?;
        Ok(ex.plan(
            cx,
            Plan::for_operation(self.clone().into()),
            &self.name,
            "function",
        ))
    }
}

impl Operation for ExtractMethod {
    fn kind(&self) -> OperationKind {
        OperationKind::ExtractMethod
    }

    fn describe(&self) -> String {
        format!(
            "extract {}:{}-{} into method {}",
            self.file, self.start_line, self.end_line, self.name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.name)?;
        let ex = Extraction::analyze(cx.ws, &self.file, self.start_line, self.end_line, true)?;
        let table = &cx.ws.package(ex.package).symbols;
        if let Some(recv) = &ex.receiver {
            let taken = table
                .methods_of(&recv.type_name)
                .iter()
                .chain(table.fields_of(&recv.type_name))
                .any(|id| cx.ws.symbol(*id).name == self.name);
            if taken {
                return Err(RefactorError::conflict(
                    &self.name,
                    format!("type {}", recv.type_name),
                ));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ex = Extraction::analyze(cx.ws, &self.file, self.start_line, self.end_line, true)?;
        Ok(ex.plan(
            cx,
            Plan::for_operation(self.clone().into()),
            &self.name,
            "method",
        ))
    }
}

/// Bind an expression to a new local declared just before the statement
/// holding it. `end_col` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractVariable {
    pub file: String,
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub name: String,
}

struct ExprSite {
    file: FileId,
    expr: Range<usize>,
    statement_start: usize,
}

impl ExtractVariable {
    fn site(&self, ws: &Workspace) -> Result<ExprSite, RefactorError> {
        let file_id = find_file(ws, &self.file)?;
        let file = ws.file(file_id);
        let here = |msg: &str| RefactorError::invalid(msg.to_string()).at(&file.path, Some(self.line));
        let (Some(start), Some(end)) = (
            file.offset_of(self.line, self.start_col),
            file.offset_of(self.line, self.end_col),
        ) else {
            return Err(here("column range lies outside the file"));
        };
        if start >= end {
            return Err(here("empty expression selection"));
        }
        let expr = node_at(file.root(), start..end)
            .filter(|n| is_expression(n.kind()))
            .ok_or_else(|| here("selection is not an expression"))?;

        let mut node = expr;
        let statement = loop {
            let Some(parent) = node.parent() else {
                return Err(here("expression is not inside a function body"));
            };
            match parent.kind() {
                "block" | "statement_list" => break node,
                "function_declaration" | "method_declaration" | "func_literal" | "source_file" => {
                    return Err(here("expression is not inside a statement"))
                }
                "short_var_declaration" | "assignment_statement"
                    if parent
                        .child_by_field_name("left")
                        .is_some_and(|l| l.byte_range().contains(&start)) =>
                {
                    return Err(here("cannot extract an assignment target"))
                }
                _ => node = parent,
            }
        };
        if statement.kind() == "for_statement" {
            return Err(here("cannot extract from a loop header"));
        }
        Ok(ExprSite {
            file: file_id,
            expr: start..end,
            statement_start: statement.start_byte(),
        })
    }
}

fn is_expression(kind: &str) -> bool {
    kind.ends_with("_expression")
        || kind.ends_with("_literal")
        || matches!(kind, "identifier" | "true" | "false" | "nil" | "iota")
}

impl Operation for ExtractVariable {
    fn kind(&self) -> OperationKind {
        OperationKind::ExtractVariable
    }

    fn describe(&self) -> String {
        format!(
            "extract {}:{}:{}-{} into variable {}",
            self.file, self.line, self.start_col, self.end_col, self.name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.name)?;
        let site = self.site(cx.ws)?;
        let file = cx.ws.file(site.file);
        let func = file
            .root()
            .descendant_for_byte_range(site.expr.start, site.expr.end)
            .and_then(|n| nodes::ancestor_of_kind(n, &["function_declaration", "method_declaration"]));
        if let Some(func) = func {
            let scan = LocalScan::of(cx.ws, file, func);
            if scan.decls.iter().any(|d| d.name == self.name) {
                return Err(RefactorError::conflict(
                    &self.name,
                    "the enclosing function",
                )
                .at(&file.path, Some(self.line)));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let site = self.site(ws)?;
        let file = ws.file(site.file);
        let src = &file.source;
        let indent = indentation_at(src, site.statement_start);
        let mut plan = Plan::for_operation(self.clone().into());
        plan.touch_package(ws.package(file.package).import_path.clone());
        plan.push(Change::insert(
            &file.path,
            site.statement_start,
            format!("{} := {}\n{indent}", self.name, &src[site.expr.clone()]),
            format!("extract variable {}", self.name),
        ));
        plan.push(Change::span(
            &file.path,
            src,
            site.expr.clone(),
            self.name.clone(),
            format!("extract variable {}", self.name),
        ));
        Ok(plan)
    }
}

/// Replace every occurrence of a literal with a new named constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConstant {
    pub package: String,
    pub literal: String,
    pub name: String,
    #[serde(default)]
    pub scope: Scope,
    /// File receiving the declaration; defaults to the package's main file.
    #[serde(default)]
    pub file: Option<String>,
}

struct Occurrences {
    package: PackageId,
    decl_file: FileId,
    sites: BTreeMap<FileId, Vec<PatternMatch>>,
}

impl ExtractConstant {
    fn occurrences(&self, cx: &Context<'_>) -> Result<Occurrences, RefactorError> {
        let ws = cx.ws;
        let package = cx.package(&self.package)?;
        let pkg = ws.package(package);
        let decl_file = match &self.file {
            Some(spec) => {
                let id = find_file(ws, spec)?;
                if ws.file(id).package != package || ws.file(id).external_test {
                    return Err(RefactorError::invalid(format!(
                        "{spec} is not a file of package {}",
                        pkg.import_path
                    )));
                }
                id
            }
            None => pkg
                .files
                .get(&format!("{}.go", pkg.name))
                .or_else(|| pkg.files.values().next())
                .copied()
                .ok_or_else(|| {
                    RefactorError::invalid(format!(
                        "package {} has no production files",
                        pkg.import_path
                    ))
                })?,
        };

        let files: Vec<FileId> = match self.scope {
            Scope::Package => pkg.all_files().collect(),
            Scope::Workspace => ws.files().iter().map(|f| f.id).collect(),
        };
        let mut sites: BTreeMap<FileId, Vec<PatternMatch>> = BTreeMap::new();
        for id in files {
            let file = ws.file(id);
            let found = find_literal(file, &self.literal)?;
            if !found.is_empty() {
                sites.insert(id, found);
            }
        }
        if sites.is_empty() {
            return Err(RefactorError::invalid(format!(
                "literal {} does not occur in {}",
                self.literal,
                match self.scope {
                    Scope::Package => format!("package {}", pkg.import_path),
                    Scope::Workspace => "the workspace".to_string(),
                }
            )));
        }
        Ok(Occurrences {
            package,
            decl_file,
            sites,
        })
    }

    /// Whether occurrences in `file` need the package qualifier.
    fn foreign(ws: &Workspace, occ: &Occurrences, file: FileId) -> bool {
        let f = ws.file(file);
        f.package != occ.package || f.external_test
    }
}

fn looks_like_literal(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some('"' | '`' | '\'') => true,
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Spans of `literal` in value positions of `file`.
fn find_literal(file: &SourceFile, literal: &str) -> Result<Vec<PatternMatch>, RefactorError> {
    let matcher = PatternMatcher::new(&file.source);
    let mut found: Vec<PatternMatch> = if literal.contains('$') {
        Vec::new()
    } else {
        matcher
            .find_all(literal)
            .map_err(|e| RefactorError::invalid(format!("bad literal {literal}: {e}")))?
            .into_iter()
            .filter(|m| m.text == literal && LITERAL_KINDS.contains(&m.kind.as_str()))
            .collect()
    };
    if found.is_empty() {
        found = matcher.find_by_kind_and_text(&LITERAL_KINDS, literal);
    }
    let root = file.root();
    found.retain(|m| match node_at(root, m.byte_start..m.byte_end) {
        Some(node) => {
            let tag = node.parent().is_some_and(|p| {
                p.kind() == "field_declaration" && p.child_by_field_name("tag") == Some(node)
            });
            !tag && nodes::ancestor_of_kind(node, &["import_spec"]).is_none()
        }
        None => false,
    });
    found.sort_by_key(|m| m.byte_start);
    found.dedup_by_key(|m| (m.byte_start, m.byte_end));
    Ok(found)
}

impl Operation for ExtractConstant {
    fn kind(&self) -> OperationKind {
        OperationKind::ExtractConstant
    }

    fn describe(&self) -> String {
        format!("extract {} into constant {}", self.literal, self.name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let ws = cx.ws;
        check_identifier(&self.name)?;
        if !looks_like_literal(&self.literal) {
            return Err(RefactorError::invalid(format!(
                "{} is not a basic literal",
                self.literal
            )));
        }
        let occ = self.occurrences(cx)?;
        let pkg = ws.package(occ.package);
        if pkg.symbols.lookup(&self.name).is_some() {
            return Err(RefactorError::conflict(
                &self.name,
                format!("package {}", pkg.import_path),
            ));
        }
        for file in occ.sites.keys().filter(|f| Self::foreign(ws, &occ, **f)) {
            let f = ws.file(*file);
            if !crate::workspace::is_exported(&self.name) {
                return Err(RefactorError::visibility(format!(
                    "unexported constant {} would be used from {}",
                    self.name,
                    ws.package(f.package).import_path
                ))
                .at(&f.path, None));
            }
            if !f.external_test && ws.graph().transitively_imports(occ.package, f.package) {
                return Err(RefactorError::cycle(format!(
                    "{} would import {} which already depends on it",
                    ws.package(f.package).import_path,
                    pkg.import_path
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let occ = self.occurrences(cx)?;
        let pkg = ws.package(occ.package);
        let mut plan = Plan::for_operation(self.clone().into());
        plan.touch_package(pkg.import_path.clone());

        let decl_file = ws.file(occ.decl_file);
        plan.push(Change::insert(
            &decl_file.path,
            decl_file.imports.end_of_imports(),
            format!("\n\nconst {} = {}", self.name, self.literal),
            format!("extract constant {}", self.name),
        ));

        for (file_id, sites) in &occ.sites {
            let file = ws.file(*file_id);
            let foreign = Self::foreign(ws, &occ, *file_id);
            let text = if foreign {
                let q = ws
                    .qualifier_for(*file_id, occ.package)
                    .unwrap_or_else(|| pkg.name.clone());
                format!("{q}.{}", self.name)
            } else {
                self.name.clone()
            };
            let description = if foreign {
                "qualified references"
            } else {
                "constant reference"
            };
            for site in sites {
                plan.push(Replacement::of_match(site, text.clone()).to_change(&file.path, description));
            }
            if foreign {
                let mut editor = ImportEditor::new(file);
                editor.add(&pkg.import_path, None);
                plan.extend(editor.changes());
                if !file.external_test && !ws.graph().imports_directly(file.package, occ.package) {
                    plan.impact.new_import_edges.insert(ImportEdge {
                        from: ws.package(file.package).import_path.clone(),
                        to: pkg.import_path.clone(),
                    });
                }
            }
            plan.touch_package(ws.package(file.package).import_path.clone());
        }
        Ok(plan)
    }
}

/// Declare an interface listing (some of) a type's methods. The type keeps
/// its methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractInterface {
    pub package: String,
    pub type_name: String,
    /// Methods to list; empty means every method (every exported one when
    /// the interface lands in another package).
    #[serde(default)]
    pub methods: Vec<String>,
    pub interface_name: String,
    #[serde(default)]
    pub target_package: Option<String>,
}

struct InterfacePlan {
    source: PackageId,
    target: PackageId,
    dest_file: FileId,
    /// Insertion point in `dest_file`.
    at: usize,
    text: String,
    imports: Vec<(String, Option<String>)>,
    uses_source: bool,
}

impl ExtractInterface {
    fn build(&self, cx: &Context<'_>) -> Result<InterfacePlan, RefactorError> {
        let ws = cx.ws;
        let source = cx.package(&self.package)?;
        let ty = cx.resolver().resolve(source, &self.type_name)?;
        let sym = ws.symbol(ty);
        if sym.kind != SymbolKind::Type {
            return Err(RefactorError::invalid(format!(
                "{} is a {}, not a concrete type",
                self.type_name, sym.kind
            )));
        }
        let target = match &self.target_package {
            Some(spec) => cx.package(spec)?,
            None => source,
        };
        let crossing = target != source;
        let table = &ws.package(source).symbols;
        let own: Vec<SymbolId> = table.methods_of(&self.type_name).to_vec();
        let methods: Vec<SymbolId> = if self.methods.is_empty() {
            own.iter()
                .copied()
                .filter(|m| !crossing || ws.symbol(*m).exported())
                .collect()
        } else {
            self.methods
                .iter()
                .map(|name| {
                    own.iter()
                        .copied()
                        .find(|m| ws.symbol(*m).name == *name)
                        .ok_or_else(|| {
                            RefactorError::not_found(
                                format!("{}.{name}", self.type_name),
                                format!("package {}", ws.package(source).import_path),
                                own.iter().map(|m| ws.symbol(*m).qualified_name()),
                            )
                        })
                })
                .collect::<Result<_, _>>()?
        };
        if methods.is_empty() {
            return Err(RefactorError::invalid(format!(
                "{} has no methods to extract",
                self.type_name
            )));
        }

        let (dest_file, at) = if crossing {
            let pkg = ws.package(target);
            let id = pkg
                .files
                .get(&format!("{}.go", pkg.name))
                .or_else(|| pkg.files.values().next())
                .copied()
                .ok_or_else(|| {
                    RefactorError::invalid(format!(
                        "package {} has no production files",
                        pkg.import_path
                    ))
                })?;
            (id, ws.file(id).source.len())
        } else {
            let file = ws.file(sym.file);
            let end = file
                .root()
                .descendant_for_byte_range(sym.offset, sym.offset + sym.name.len())
                .and_then(|n| nodes::ancestor_of_kind(n, &["type_declaration"]))
                .map_or(sym.decl_range.end, |n| n.end_byte());
            (sym.file, end)
        };

        let source_qualifier = ws
            .qualifier_for(dest_file, source)
            .unwrap_or_else(|| ws.package(source).name.clone());
        let mut lines = Vec::new();
        let mut imports = Vec::new();
        let mut uses_source = false;
        for m in &methods {
            let method = ws.symbol(*m);
            let Some(sig) = &method.signature else {
                continue;
            };
            let end = sig
                .results_range
                .as_ref()
                .map_or(sig.params_range.end, |r| r.end);
            let t = Transplant {
                ws,
                index: cx.index,
                file: method.file,
                target: Some(target),
                target_import_path: ws.package(target).import_path.clone(),
                source_qualifier: source_qualifier.clone(),
                keep: Vec::new(),
            };
            let out = t.render(sig.params_range.start..end, Vec::new());
            if let Some(name) = out.unexported.first() {
                return Err(RefactorError::visibility(format!(
                    "{}.{} mentions unexported {name}",
                    self.type_name, method.name
                ))
                .at(&ws.file(method.file).path, Some(ws.file(method.file).line_of(method.offset))));
            }
            uses_source |= out.uses_source;
            imports.extend(out.imports);
            lines.push(format!("\t{}{}\n", method.name, out.text));
        }
        let text = format!(
            "// {} is implemented by {}.\ntype {} interface {{\n{}}}",
            self.interface_name,
            self.type_name,
            self.interface_name,
            lines.concat()
        );
        Ok(InterfacePlan {
            source,
            target,
            dest_file,
            at,
            text,
            imports,
            uses_source,
        })
    }
}

impl Operation for ExtractInterface {
    fn kind(&self) -> OperationKind {
        OperationKind::ExtractInterface
    }

    fn describe(&self) -> String {
        format!(
            "extract interface {} from {}",
            self.interface_name, self.type_name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let ws = cx.ws;
        check_identifier(&self.interface_name)?;
        let p = self.build(cx)?;
        let target = ws.package(p.target);
        if target.symbols.lookup(&self.interface_name).is_some() {
            return Err(RefactorError::conflict(
                &self.interface_name,
                format!("package {}", target.import_path),
            ));
        }
        if p.uses_source && ws.graph().transitively_imports(p.source, p.target) {
            return Err(RefactorError::cycle(format!(
                "{} would import {} which already depends on it",
                target.import_path,
                ws.package(p.source).import_path
            )));
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let p = self.build(cx)?;
        let file = ws.file(p.dest_file);
        let mut plan = Plan::for_operation(self.clone().into());
        plan.touch_package(ws.package(p.target).import_path.clone());

        let at_end = p.at == file.source.len();
        let text = if at_end {
            let lead = if file.source.ends_with('\n') { "\n" } else { "\n\n" };
            format!("{lead}{}\n", p.text)
        } else {
            format!("\n\n{}", p.text)
        };
        plan.push(Change::insert(
            &file.path,
            p.at,
            text,
            format!("extract interface {}", self.interface_name),
        ));

        let mut editor = ImportEditor::new(file);
        for (path, alias) in &p.imports {
            editor.add(path, alias.as_deref());
        }
        if p.uses_source {
            editor.add(&ws.package(p.source).import_path, None);
            if !ws.graph().imports_directly(p.target, p.source) {
                plan.impact.new_import_edges.insert(ImportEdge {
                    from: ws.package(p.target).import_path.clone(),
                    to: ws.package(p.source).import_path.clone(),
                });
            }
        }
        plan.extend(editor.changes());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};

    const CALC: &str = "package calc

func Total(items []int) int {
\tsum := 0
\tfor _, it := range items {
\t\tsum += it
\t}
\tavg := sum / len(items)
\treturn avg
}
";

    fn extract_fn(file: &str, start: usize, end: usize, name: &str) -> ExtractFunction {
        ExtractFunction {
            file: file.into(),
            start_line: start,
            end_line: end,
            name: name.into(),
        }
    }

    #[test]
    fn extract_function_passes_params_and_returns_results() {
        let ws = workspace(&[("calc/calc.go", CALC)]);
        let p = plan(&ws, extract_fn("calc/calc.go", 4, 7, "sumOf")).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(
            out["calc/calc.go"],
            "package calc

func Total(items []int) int {
\tsum := sumOf(items)
\tavg := sum / len(items)
\treturn avg
}

func sumOf(items []int) int {
\tsum := 0
\tfor _, it := range items {
\t\tsum += it
\t}
\treturn sum
}
"
        );
        assert!(p.issues().is_empty());
    }

    #[test]
    fn selection_with_return_is_rejected() {
        let ws = workspace(&[("calc/calc.go", CALC)]);
        let err = plan(&ws, extract_fn("calc/calc.go", 8, 9, "tail")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
        assert!(err.to_string().contains("return"));
    }

    #[test]
    fn partial_statement_is_rejected() {
        let ws = workspace(&[("calc/calc.go", CALC)]);
        let err = plan(&ws, extract_fn("calc/calc.go", 5, 6, "loop")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
    }

    #[test]
    fn existing_name_conflicts() {
        let ws = workspace(&[("calc/calc.go", CALC)]);
        let err = plan(&ws, extract_fn("calc/calc.go", 4, 7, "Total")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::NameConflict);
    }

    #[test]
    fn extract_method_reassigns_modified_locals() {
        let src = "package shop

type Cart struct{ items []int }

func (c *Cart) Total() int {
\tn := 0
\tfor _, it := range c.items {
\t\tn += it
\t}
\treturn n
}
";
        let ws = workspace(&[("shop/cart.go", src)]);
        let op = ExtractMethod {
            file: "shop/cart.go".into(),
            start_line: 7,
            end_line: 9,
            name: "addItems".into(),
        };
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["shop/cart.go"];
        assert!(out.contains("\tn = c.addItems(n)\n\treturn n\n"));
        assert!(out.contains(
            "func (c *Cart) addItems(n int) int {\n\tfor _, it := range c.items {\n\t\tn += it\n\t}\n\treturn n\n}"
        ));
    }

    #[test]
    fn extract_method_outside_method_is_invalid() {
        let ws = workspace(&[("calc/calc.go", CALC)]);
        let op = ExtractMethod {
            file: "calc/calc.go".into(),
            start_line: 4,
            end_line: 4,
            name: "start".into(),
        };
        assert_eq!(
            plan(&ws, op).unwrap_err().kind(),
            IssueKind::InvalidOperation
        );
    }

    #[test]
    fn extract_variable_inserts_declaration() {
        let src = "package geo\n\nfunc Area(w, h int) int {\n\treturn w * h * 2\n}\n";
        let ws = workspace(&[("geo/geo.go", src)]);
        let op = ExtractVariable {
            file: "geo/geo.go".into(),
            line: 4,
            start_col: 9,
            end_col: 14,
            name: "area".into(),
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(
            applied(&ws, &p)["geo/geo.go"],
            "package geo\n\nfunc Area(w, h int) int {\n\tarea := w * h\n\treturn area * 2\n}\n"
        );
    }

    #[test]
    fn extract_variable_rejects_non_expression() {
        let src = "package geo\n\nfunc Area(w, h int) int {\n\treturn w * h * 2\n}\n";
        let ws = workspace(&[("geo/geo.go", src)]);
        let op = ExtractVariable {
            file: "geo/geo.go".into(),
            line: 4,
            start_col: 2,
            end_col: 11,
            name: "x".into(),
        };
        assert_eq!(
            plan(&ws, op).unwrap_err().kind(),
            IssueKind::InvalidOperation
        );
    }

    const WEB: &str = "package web\n\nimport \"net/http\"\n\nfunc Set(h http.Header) { h.Set(\"Content-Type\", \"application/json\") }\n";
    const WEB2: &str = "package web\n\nfunc Kind() string { return \"application/json\" }\n";

    #[test]
    fn extract_constant_replaces_every_occurrence() {
        let ws = workspace(&[("web/web.go", WEB), ("web/kind.go", WEB2)]);
        let op = ExtractConstant {
            package: "web".into(),
            literal: "\"application/json\"".into(),
            name: "JSONType".into(),
            scope: Scope::Package,
            file: None,
        };
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(
            out["web/web.go"],
            "package web\n\nimport \"net/http\"\n\nconst JSONType = \"application/json\"\n\nfunc Set(h http.Header) { h.Set(\"Content-Type\", JSONType) }\n"
        );
        assert_eq!(
            out["web/kind.go"],
            "package web\n\nfunc Kind() string { return JSONType }\n"
        );
    }

    #[test]
    fn workspace_constant_is_qualified_elsewhere() {
        let api = "package api\n\nfunc Mime() string { return \"application/json\" }\n";
        let ws = workspace(&[("web/web.go", WEB), ("api/api.go", api)]);
        let op = ExtractConstant {
            package: "web".into(),
            literal: "\"application/json\"".into(),
            name: "JSONType".into(),
            scope: Scope::Workspace,
            file: None,
        };
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(
            out["api/api.go"],
            "package api\n\nimport \"example.com/m/web\"\n\nfunc Mime() string { return web.JSONType }\n"
        );
        let unexported = ExtractConstant {
            package: "web".into(),
            literal: "\"application/json\"".into(),
            name: "jsonType".into(),
            scope: Scope::Workspace,
            file: None,
        };
        assert_eq!(
            plan(&ws, unexported).unwrap_err().kind(),
            IssueKind::VisibilityViolation
        );
    }

    #[test]
    fn missing_literal_is_invalid() {
        let ws = workspace(&[("web/web.go", WEB)]);
        let op = ExtractConstant {
            package: "web".into(),
            literal: "42".into(),
            name: "Answer".into(),
            scope: Scope::Package,
            file: None,
        };
        assert_eq!(
            plan(&ws, op).unwrap_err().kind(),
            IssueKind::InvalidOperation
        );
    }

    const STORE: &str = "package store

type Item struct{ ID string }

type Store struct{ items map[string]Item }

func (s *Store) Get(id string) (Item, bool) {
\tit, ok := s.items[id]
\treturn it, ok
}

func (s *Store) Put(it Item) { s.items[it.ID] = it }

func (s *Store) size() int { return len(s.items) }
";

    #[test]
    fn interface_lands_after_the_type() {
        let ws = workspace(&[("store/store.go", STORE)]);
        let op = ExtractInterface {
            package: "store".into(),
            type_name: "Store".into(),
            methods: vec!["Get".into(), "Put".into()],
            interface_name: "Getter".into(),
            target_package: None,
        };
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["store/store.go"];
        assert!(out.contains(
            "type Store struct{ items map[string]Item }\n\n// Getter is implemented by Store.\ntype Getter interface {\n\tGet(id string) (Item, bool)\n\tPut(it Item)\n}\n\nfunc (s *Store)"
        ));
    }

    #[test]
    fn interface_in_other_package_qualifies_types() {
        let api = "package api\n\nfunc Use() {}\n";
        let ws = workspace(&[("store/store.go", STORE), ("api/api.go", api)]);
        let op = ExtractInterface {
            package: "store".into(),
            type_name: "Store".into(),
            methods: Vec::new(),
            interface_name: "Storage".into(),
            target_package: Some("api".into()),
        };
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["api/api.go"];
        assert!(out.starts_with("package api\n\nimport \"example.com/m/store\"\n"));
        assert!(out.contains("\tGet(id string) (store.Item, bool)\n\tPut(it store.Item)\n}\n"));
        assert!(!out.contains("size"));
    }

    #[test]
    fn unknown_method_is_reported() {
        let ws = workspace(&[("store/store.go", STORE)]);
        let op = ExtractInterface {
            package: "store".into(),
            type_name: "Store".into(),
            methods: vec!["Delete".into()],
            interface_name: "Deleter".into(),
            target_package: None,
        };
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::SymbolNotFound);
    }
}
