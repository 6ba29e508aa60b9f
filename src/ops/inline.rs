//! Inline operations: calls give way to the callee's body, references to a
//! variable or constant give way to its initializer.
//!
//! Inlined plans are not reversible: the declaration (and the call shape)
//! cannot be recovered from the result.

use crate::error::RefactorError;
use crate::ops::common::{
    call_of, decl_span, find_file, indentation_at, mutation, node_at, own_line,
    prune_imports_except, tidy_removals, wrap_for_site, ImportEditor, LocalScan, PendingEdits,
};
use crate::ops::transplant::{Transplant, Transplanted};
use crate::ops::{Context, Operation, OperationKind};
use crate::plan::{Change, Issue, IssueKind, Plan};
use crate::ts::nodes;
use crate::workspace::{FileId, SourceFile, SymbolId, SymbolKind, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use tracing::debug;
use tree_sitter::Node;

/// Replace every call of a function with its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFunction {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub keep_declaration: bool,
}

/// Replace every call of a concrete method with its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineMethod {
    #[serde(default)]
    pub package: Option<String>,
    pub type_name: String,
    pub method: String,
    #[serde(default)]
    pub keep_declaration: bool,
}

enum BodyForm {
    Empty,
    /// `return expr`: the range and kind of `expr`.
    Expression(Range<usize>, String),
    Statements {
        range: Range<usize>,
        returns: bool,
    },
}

/// A function or method body prepared for copying into call sites.
struct Callee<'a> {
    symbol: SymbolId,
    file: &'a SourceFile,
    /// Offsets of the parameter names by position; `None` when unnamed.
    params: Vec<Option<usize>>,
    receiver: Option<usize>,
    results: Option<Range<usize>>,
    body: Range<usize>,
    form: BodyForm,
    scan: LocalScan,
}

struct Site<'a> {
    file: FileId,
    call: Node<'a>,
    args: Vec<Node<'a>>,
    operand: Option<Node<'a>>,
    statement: bool,
}

struct Rendered {
    range: Range<usize>,
    text: String,
    imports: Vec<(String, Option<String>)>,
    uses_source: bool,
    unexported: Vec<String>,
    /// A call-valued argument is evaluated more than once.
    repeated: bool,
}

fn return_value(stmt: Node<'_>) -> Option<Node<'_>> {
    match nodes::named_children(stmt).as_slice() {
        [list] if list.kind() == "expression_list" => match nodes::named_children(*list).as_slice()
        {
            [only] => Some(*only),
            _ => None,
        },
        [only] => Some(*only),
        _ => None,
    }
}

/// Any `return` outside nested function literals.
fn contains_return(stmts: &[Node<'_>]) -> bool {
    let mut stack: Vec<Node<'_>> = stmts.to_vec();
    while let Some(node) = stack.pop() {
        match node.kind() {
            "func_literal" => continue,
            "return_statement" => return true,
            _ => stack.extend(nodes::named_children(node)),
        }
    }
    false
}

fn contains_call(node: Node<'_>) -> bool {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "call_expression" {
            return true;
        }
        stack.extend(nodes::named_children(n));
    }
    false
}

/// Re-indent `text` whose continuation lines carry `from` so that every
/// line starts with `to`.
fn indent_lines(text: &str, from: &str, to: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{to}{}", line.strip_prefix(from).unwrap_or(line))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl<'a> Callee<'a> {
    fn new(cx: &Context<'a>, symbol: SymbolId) -> Result<Self, RefactorError> {
        let ws = cx.ws;
        let sym = ws.symbol(symbol);
        let file = ws.file(sym.file);
        let here = |msg: String| {
            RefactorError::invalid(msg).at(&file.path, Some(file.line_of(sym.offset)))
        };
        let label = sym.qualified_name();

        let decl = file
            .root()
            .descendant_for_byte_range(sym.offset, sym.offset + sym.name.len())
            .and_then(|n| nodes::ancestor_of_kind(n, &["function_declaration", "method_declaration"]))
            .ok_or_else(|| here(format!("{label} has no body to inline")))?;
        let body = decl
            .child_by_field_name("body")
            .ok_or_else(|| here(format!("{label} has no body to inline")))?;
        if decl.child_by_field_name("type_parameters").is_some() {
            return Err(here(format!("generic function {label} cannot be inlined")));
        }

        let mut params = Vec::new();
        if let Some(list) = decl.child_by_field_name("parameters") {
            for param in nodes::named_children(list) {
                if param.kind() == "variadic_parameter_declaration" {
                    return Err(here(format!("variadic function {label} cannot be inlined")));
                }
                let names = nodes::field_children(param, "name");
                if names.is_empty() {
                    params.push(None);
                } else {
                    params.extend(names.iter().map(|n| Some(n.start_byte())));
                }
            }
        }
        let receiver = decl
            .child_by_field_name("receiver")
            .and_then(|l| nodes::named_children(l).into_iter().next())
            .and_then(|p| p.child_by_field_name("name"))
            .map(|n| n.start_byte());

        let stmts = nodes::block_statements(body);
        let single = match stmts.as_slice() {
            [only] if only.kind() == "return_statement" => return_value(*only),
            _ => None,
        };
        let form = match (single, stmts.first(), stmts.last()) {
            (Some(expr), _, _) => BodyForm::Expression(expr.byte_range(), expr.kind().to_string()),
            (None, Some(first), Some(last)) => BodyForm::Statements {
                range: first.start_byte()..last.end_byte(),
                returns: contains_return(&stmts),
            },
            _ => BodyForm::Empty,
        };

        let scan = LocalScan::of(ws, file, decl);
        let bound: Vec<usize> = params.iter().flatten().copied().chain(receiver).collect();
        for (name, offset) in &scan.uses {
            if !body.byte_range().contains(offset) {
                continue;
            }
            let Some(binding) = scan.binding_before(name, *offset) else {
                continue;
            };
            if !bound.contains(&binding.offset) {
                continue;
            }
            let how = file
                .root()
                .descendant_for_byte_range(*offset, offset + name.len())
                .and_then(mutation);
            if let Some(how) = how {
                return Err(RefactorError::invalid(format!(
                    "parameter {name} is {how} inside {label}"
                ))
                .at(&file.path, Some(file.line_of(*offset))));
            }
        }

        let span = decl.byte_range();
        if cx
            .index
            .uses(symbol)
            .iter()
            .any(|r| r.file == sym.file && span.contains(&r.offset))
        {
            return Err(here(format!("{label} is recursive")));
        }
        Ok(Self {
            symbol,
            file,
            params,
            receiver,
            results: decl.child_by_field_name("result").map(|r| r.byte_range()),
            body: body.byte_range(),
            form,
            scan,
        })
    }

    /// Call sites that can be inlined, plus a reason for every use that
    /// cannot.
    fn sites(&self, cx: &Context<'a>) -> (Vec<Site<'a>>, Vec<String>) {
        let ws = cx.ws;
        let is_method = ws.symbol(self.symbol).kind == SymbolKind::Method;
        let mut sites = Vec::new();
        let mut skipped = Vec::new();
        for r in cx.index.uses(self.symbol) {
            let file = ws.file(r.file);
            let at = format!("{}:{}", r.path.display(), r.line);
            if r.ambiguous {
                skipped.push(format!("{at}: receiver type unknown"));
                continue;
            }
            let Some(call) = call_of(file.root(), r.offset, r.name.len()) else {
                skipped.push(format!("{at}: not a call"));
                continue;
            };
            if call
                .parent()
                .is_some_and(|p| matches!(p.kind(), "go_statement" | "defer_statement"))
            {
                skipped.push(format!("{at}: go or defer statement"));
                continue;
            }
            let args = call
                .child_by_field_name("arguments")
                .map(nodes::named_children)
                .unwrap_or_default();
            if args.len() != self.params.len() || args.iter().any(|a| a.kind() == "variadic_argument") {
                skipped.push(format!("{at}: arguments do not match the parameters"));
                continue;
            }
            let operand = call
                .child_by_field_name("function")
                .filter(|f| is_method && f.kind() == "selector_expression")
                .and_then(|f| f.child_by_field_name("operand"));
            sites.push(Site {
                file: r.file,
                call,
                args,
                operand,
                statement: call
                    .parent()
                    .is_some_and(|p| p.kind() == "expression_statement"),
            });
        }
        sites.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(b.call.start_byte().cmp(&a.call.start_byte()))
                .then(a.call.end_byte().cmp(&b.call.end_byte()))
        });
        (sites, skipped)
    }

    fn render(&self, cx: &Context<'a>, site: &Site<'a>, pending: &mut PendingEdits) -> Rendered {
        let ws = cx.ws;
        let site_file = ws.file(site.file);
        let site_src = &site_file.source;
        let callee_pkg = self.file.package;
        let args: Vec<(String, &str)> = site
            .args
            .iter()
            .map(|a| (pending.text(site_src, a.byte_range()), a.kind()))
            .collect();
        let operand = site
            .operand
            .map(|o| (pending.text(site_src, o.byte_range()), o.kind()));

        let mut subs = Vec::new();
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for (name, offset) in &self.scan.uses {
            if !self.body.contains(offset) {
                continue;
            }
            let Some(binding) = self.scan.binding_before(name, *offset) else {
                continue;
            };
            let value = if Some(binding.offset) == self.receiver {
                operand.as_ref()
            } else {
                self.params
                    .iter()
                    .position(|p| *p == Some(binding.offset))
                    .and_then(|i| args.get(i))
            };
            let Some((text, kind)) = value else {
                continue;
            };
            *counts.entry(binding.offset).or_default() += 1;
            let text = match self
                .file
                .root()
                .descendant_for_byte_range(*offset, offset + name.len())
            {
                Some(ident) => wrap_for_site(text, kind, ident),
                None => text.clone(),
            };
            subs.push((*offset..offset + name.len(), text));
        }
        let repeated = site.args.iter().enumerate().any(|(i, a)| {
            contains_call(*a)
                && self.params[i].is_some_and(|p| counts.get(&p).copied().unwrap_or(0) > 1)
        });

        let t = Transplant {
            ws,
            index: cx.index,
            file: self.file.id,
            target: (!site_file.external_test).then_some(site_file.package),
            target_import_path: if site_file.external_test {
                String::new()
            } else {
                ws.package(site_file.package).import_path.clone()
            },
            source_qualifier: ws
                .qualifier_for(site.file, callee_pkg)
                .unwrap_or_else(|| ws.package(callee_pkg).name.clone()),
            keep: Vec::new(),
        };

        let indent = indentation_at(site_src, site.call.start_byte());
        let mut imports = Vec::new();
        let mut uses_source = false;
        let mut unexported = Vec::new();
        let mut absorb = |out: Transplanted| {
            imports.extend(out.imports);
            uses_source |= out.uses_source;
            unexported.extend(out.unexported);
            out.text
        };

        let (range, text) = match &self.form {
            BodyForm::Expression(range, kind) => {
                let text = absorb(t.render(range.clone(), subs));
                (site.call.byte_range(), wrap_for_site(&text, kind, site.call))
            }
            BodyForm::Statements { range, returns } => {
                let from = indentation_at(&self.file.source, range.start);
                let body = absorb(t.render(range.clone(), subs));
                let inner = indent_lines(&body, from, &format!("{indent}\t"));
                let text = if site.statement && !returns {
                    format!("{{\n{inner}\n{indent}}}")
                } else {
                    let results = match &self.results {
                        Some(r) => format!(" {}", absorb(t.render(r.clone(), Vec::new()))),
                        None => String::new(),
                    };
                    format!("func(){results} {{\n{inner}\n{indent}}}()")
                };
                (site.call.byte_range(), text)
            }
            BodyForm::Empty if site.statement => {
                (own_line(site_src, site.call.byte_range()), String::new())
            }
            BodyForm::Empty => (site.call.byte_range(), "func() {}()".to_string()),
        };
        Rendered {
            range,
            text,
            imports,
            uses_source,
            unexported,
            repeated,
        }
    }

    /// Interfaces whose compliance depends on this method existing.
    fn required_by_interface(&self, cx: &Context<'a>) -> Option<String> {
        let ws = cx.ws;
        let sym = ws.symbol(self.symbol);
        let owner = cx.resolver().owner_type(self.symbol)?;
        cx.resolver()
            .interfaces_implemented_by(owner)
            .into_iter()
            .find(|iface| {
                cx.resolver()
                    .interface_method_set(*iface)
                    .iter()
                    .any(|m| ws.symbol(*m).name == sym.name)
            })
            .map(|iface| ws.symbol(iface).qualified_name())
    }

    fn check_sites(&self, cx: &Context<'a>) -> Result<(), RefactorError> {
        let ws = cx.ws;
        let (sites, skipped) = self.sites(cx);
        let label = ws.symbol(self.symbol).qualified_name();
        if sites.is_empty() {
            return Err(RefactorError::invalid(match skipped.first() {
                Some(reason) => format!("no call of {label} can be inlined ({reason})"),
                None => format!("{label} is never called"),
            }));
        }
        for site in &sites {
            let out = self.render(cx, site, &mut PendingEdits::new());
            if let Some(name) = out.unexported.first() {
                let file = ws.file(site.file);
                return Err(RefactorError::visibility(format!(
                    "inlining {label} into {} would reference unexported {name}",
                    ws.package(file.package).import_path
                ))
                .at(&file.path, Some(file.line_of(site.call.start_byte()))));
            }
        }
        Ok(())
    }

    fn plan(
        &self,
        cx: &Context<'a>,
        mut plan: Plan,
        keep_declaration: bool,
    ) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let sym = ws.symbol(self.symbol);
        let label = sym.qualified_name();
        plan.reversible = false;
        let (sites, skipped) = self.sites(cx);

        let mut pending: BTreeMap<FileId, PendingEdits> = BTreeMap::new();
        let mut needed: BTreeMap<FileId, Vec<(String, Option<String>)>> = BTreeMap::new();
        for site in &sites {
            let edits = pending.entry(site.file).or_default();
            let out = self.render(cx, site, edits);
            let file = ws.file(site.file);
            if out.repeated {
                plan.add_issue(
                    Issue::warning(
                        IssueKind::CompilationSuspect,
                        format!("an argument of {label} with a call is now evaluated more than once"),
                    )
                    .at(&file.path, Some(file.line_of(site.call.start_byte()))),
                );
            }
            edits.push(out.range, out.text, format!("inline {label}"));
            let list = needed.entry(site.file).or_default();
            list.extend(out.imports);
            if out.uses_source {
                list.push((ws.package(self.file.package).import_path.clone(), None));
            }
            plan.touch_package(ws.package(file.package).import_path.clone());
        }

        for reason in &skipped {
            plan.add_issue(Issue::warning(
                IssueKind::InvalidOperation,
                format!("use of {label} not inlined: {reason}"),
            ));
        }

        let mut editors: BTreeMap<FileId, ImportEditor<'_>> = BTreeMap::new();
        for (file_id, list) in &needed {
            let file = ws.file(*file_id);
            let own = &ws.package(file.package).import_path;
            let editor = editors.entry(*file_id).or_insert_with(|| ImportEditor::new(file));
            for (path, alias) in list {
                if path != own || file.external_test {
                    editor.add(path, alias.as_deref());
                }
            }
        }

        let interface = if sym.kind == SymbolKind::Method {
            self.required_by_interface(cx)
        } else {
            None
        };
        match (keep_declaration, skipped.is_empty(), interface) {
            (true, _, _) => {}
            (false, false, _) => plan.add_issue(Issue::info(
                IssueKind::InvalidOperation,
                format!("declaration of {label} kept: {} uses remain", skipped.len()),
            )),
            (false, true, Some(iface)) => plan.add_issue(Issue::info(
                IssueKind::InvalidOperation,
                format!("declaration of {label} kept: required by {iface}"),
            )),
            (false, true, None) => {
                let file = self.file;
                let removal = tidy_removals(&file.source, vec![decl_span(file, sym).removal]);
                for range in &removal {
                    plan.push(Change::delete(
                        &file.path,
                        &file.source,
                        range.clone(),
                        format!("inline {label}: remove declaration"),
                    ));
                }
                let keep: BTreeSet<String> = needed
                    .get(&file.id)
                    .map(|l| l.iter().map(|(p, _)| p.clone()).collect())
                    .unwrap_or_default();
                let editor = editors.entry(file.id).or_insert_with(|| ImportEditor::new(file));
                prune_imports_except(ws, editor, &removal, &keep);
            }
        }

        for (file_id, edits) in pending {
            let file = ws.file(file_id);
            plan.extend(edits.into_changes(&file.path, &file.source));
        }
        for editor in editors.values() {
            plan.extend(editor.changes());
        }
        debug!(callee = %label, sites = sites.len(), skipped = skipped.len(), "inline planned");
        Ok(plan)
    }
}

impl InlineFunction {
    fn symbol(&self, cx: &Context<'_>) -> Result<SymbolId, RefactorError> {
        let pkg = cx.package(&self.package)?;
        let id = cx.resolver().resolve(pkg, &self.name)?;
        let sym = cx.ws.symbol(id);
        if sym.kind != SymbolKind::Function {
            return Err(RefactorError::invalid(format!(
                "{} is a {}, not a function",
                self.name, sym.kind
            )));
        }
        Ok(id)
    }
}

impl Operation for InlineFunction {
    fn kind(&self) -> OperationKind {
        OperationKind::InlineFunction
    }

    fn describe(&self) -> String {
        format!("inline function {}", self.name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let id = self.symbol(cx)?;
        Callee::new(cx, id)?.check_sites(cx)
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let id = self.symbol(cx)?;
        Callee::new(cx, id)?.plan(
            cx,
            Plan::for_operation(self.clone().into()),
            self.keep_declaration,
        )
    }
}

impl InlineMethod {
    fn symbol(&self, cx: &Context<'_>) -> Result<SymbolId, RefactorError> {
        let id = match &self.package {
            Some(spec) => {
                let pkg = cx.package(spec)?;
                cx.resolver().resolve_method(pkg, &self.type_name, &self.method)?
            }
            None => cx
                .resolver()
                .resolve_method_anywhere(&self.type_name, &self.method)?,
        };
        if cx.ws.symbol(id).in_interface {
            return Err(RefactorError::invalid(format!(
                "{}.{} is an interface method and has no body",
                self.type_name, self.method
            )));
        }
        Ok(id)
    }
}

impl Operation for InlineMethod {
    fn kind(&self) -> OperationKind {
        OperationKind::InlineMethod
    }

    fn describe(&self) -> String {
        format!("inline method {}.{}", self.type_name, self.method)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let id = self.symbol(cx)?;
        Callee::new(cx, id)?.check_sites(cx)
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let id = self.symbol(cx)?;
        Callee::new(cx, id)?.plan(
            cx,
            Plan::for_operation(self.clone().into()),
            self.keep_declaration,
        )
    }
}

/// Replace every use of a variable with its initializer and drop the
/// declaration. A `line` selects a function-local variable declared on
/// that line of `file`; otherwise `package` names a package-level one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineVariable {
    #[serde(default)]
    pub package: Option<String>,
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
}

/// Replace every use of a constant with its value and drop the declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineConstant {
    pub package: String,
    pub name: String,
}

/// A variable or constant ready to be substituted.
struct Inlinable<'a> {
    name: String,
    file: &'a SourceFile,
    init: Node<'a>,
    declared_type: Option<Range<usize>>,
    /// Deleted once every use is replaced; `None` when the declaration
    /// also declares other names.
    removal: Option<Range<usize>>,
    /// Expressions to replace, with their files.
    sites: Vec<(FileId, Node<'a>)>,
}

/// Initializer of `name` in a `var_spec`/`const_spec`, its declared type,
/// and whether the spec declares only that name.
fn spec_initializer<'t>(
    spec: Node<'t>,
    name: &str,
    src: &str,
) -> Result<(Node<'t>, Option<Range<usize>>, bool), RefactorError> {
    let names = nodes::field_children(spec, "name");
    let values = spec
        .child_by_field_name("value")
        .map(|v| {
            if v.kind() == "expression_list" {
                nodes::named_children(v)
            } else {
                vec![v]
            }
        })
        .unwrap_or_default();
    let idx = names.iter().position(|n| nodes::text(*n, src) == name);
    match idx.and_then(|i| values.get(i)) {
        Some(value) if values.len() == names.len() => Ok((
            *value,
            spec.child_by_field_name("type").map(|t| t.byte_range()),
            names.len() == 1,
        )),
        _ => Err(RefactorError::invalid(format!(
            "{name} has no initializer of its own"
        ))),
    }
}

fn uses_iota(node: Node<'_>, src: &str) -> bool {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == "iota" || (n.kind() == "identifier" && nodes::text(n, src) == "iota") {
            return true;
        }
        stack.extend(nodes::named_children(n));
    }
    false
}

fn mutated_at(file: &SourceFile, node: Node<'_>, name: &str) -> Result<(), RefactorError> {
    match mutation(node) {
        Some(how) => Err(RefactorError::invalid(format!(
            "{name} is {how} and cannot be inlined"
        ))
        .at(&file.path, Some(file.line_of(node.start_byte())))),
        None => Ok(()),
    }
}

impl<'a> Inlinable<'a> {
    fn package_level(cx: &Context<'a>, id: SymbolId) -> Result<Self, RefactorError> {
        let ws = cx.ws;
        let sym = ws.symbol(id);
        let file = ws.file(sym.file);
        let spec = file
            .root()
            .descendant_for_byte_range(sym.offset, sym.offset + sym.name.len())
            .and_then(|n| nodes::ancestor_of_kind(n, &["var_spec", "const_spec"]))
            .ok_or_else(|| RefactorError::invalid(format!("{} has no initializer", sym.name)))?;
        let (init, declared_type, single) = spec_initializer(spec, &sym.name, &file.source)?;

        let mut sites = Vec::new();
        for r in cx.index.uses(id) {
            let site_file = ws.file(r.file);
            let range = match &r.qualifier {
                Some(q) => q.start..r.range().end,
                None => r.range(),
            };
            let node = node_at(site_file.root(), range).ok_or_else(|| {
                RefactorError::invalid(format!("cannot replace {} here", sym.name))
                    .at(&r.path, Some(r.line))
            })?;
            mutated_at(site_file, node, &sym.name)?;
            sites.push((r.file, node));
        }
        Ok(Self {
            name: sym.name.clone(),
            file,
            init,
            declared_type,
            removal: single.then(|| decl_span(file, sym).removal),
            sites,
        })
    }

    fn local(
        cx: &Context<'a>,
        file_spec: &str,
        line: usize,
        name: &str,
    ) -> Result<Self, RefactorError> {
        let ws = cx.ws;
        let file = ws.file(find_file(ws, file_spec)?);
        let src = &file.source;
        let (Some(start), Some(end)) = (file.line_start(line), file.line_end(line)) else {
            return Err(RefactorError::invalid(format!(
                "line {line} is outside {}",
                file.path.display()
            )));
        };
        let func = file
            .root()
            .descendant_for_byte_range(start, end)
            .and_then(|n| nodes::ancestor_of_kind(n, &["function_declaration", "method_declaration"]))
            .ok_or_else(|| {
                RefactorError::invalid(format!("line {line} is not inside a function"))
                    .at(&file.path, Some(line))
            })?;
        let scan = LocalScan::of(ws, file, func);
        let decl = scan
            .decls
            .iter()
            .find(|d| d.name == name && file.line_of(d.offset) == line)
            .ok_or_else(|| {
                RefactorError::not_found(
                    name,
                    format!("{}:{line}", file.path.display()),
                    scan.decls.iter().map(|d| d.name.clone()),
                )
            })?;
        let holder = file
            .root()
            .descendant_for_byte_range(decl.offset, decl.offset + name.len())
            .and_then(|n| {
                nodes::ancestor_of_kind(
                    n,
                    &["short_var_declaration", "var_spec", "const_spec", "parameter_list", "block"],
                )
            })
            .ok_or_else(|| RefactorError::invalid(format!("{name} has no initializer")))?;

        let (init, declared_type, statement) = match holder.kind() {
            "short_var_declaration" => {
                let list = |field| {
                    holder
                        .child_by_field_name(field)
                        .map(|n| {
                            if n.kind() == "expression_list" {
                                nodes::named_children(n)
                            } else {
                                vec![n]
                            }
                        })
                        .unwrap_or_default()
                };
                let (left, right) = (list("left"), list("right"));
                let idx = left.iter().position(|n| n.start_byte() == decl.offset);
                let init = match idx.and_then(|i| right.get(i)) {
                    Some(v) if left.len() == right.len() => *v,
                    _ => {
                        return Err(RefactorError::invalid(format!(
                            "{name} has no initializer of its own"
                        ))
                        .at(&file.path, Some(line)))
                    }
                };
                (init, None, (left.len() == 1).then_some(holder))
            }
            "var_spec" | "const_spec" => {
                let (init, ty, single) = spec_initializer(holder, name, src)?;
                let decl_node = holder.parent().filter(|d| {
                    matches!(d.kind(), "var_declaration" | "const_declaration")
                        && nodes::specs(*d, holder.kind()).len() == 1
                });
                (init, ty, decl_node.filter(|_| single))
            }
            _ => {
                return Err(RefactorError::invalid(format!("{name} has no initializer"))
                    .at(&file.path, Some(line)))
            }
        };
        let removal = statement
            .filter(|s| {
                s.parent()
                    .is_some_and(|p| matches!(p.kind(), "block" | "statement_list"))
            })
            .map(|s| own_line(src, s.byte_range()));

        let mut sites = Vec::new();
        for (use_name, offset) in &scan.uses {
            if use_name != name
                || scan.binding_before(use_name, *offset).map(|b| b.offset) != Some(decl.offset)
            {
                continue;
            }
            let Some(node) = file
                .root()
                .descendant_for_byte_range(*offset, offset + name.len())
            else {
                continue;
            };
            mutated_at(file, node, name)?;
            sites.push((file.id, node));
        }
        Ok(Self {
            name: name.to_string(),
            file,
            init,
            declared_type,
            removal,
            sites,
        })
    }

    fn plan(&self, cx: &Context<'a>, mut plan: Plan) -> Plan {
        let ws = cx.ws;
        let src = &self.file.source;
        plan.reversible = false;
        plan.touch_package(ws.package(self.file.package).import_path.clone());

        let mut needed: BTreeMap<FileId, Vec<(String, Option<String>)>> = BTreeMap::new();
        let mut dead: BTreeMap<FileId, Vec<Range<usize>>> = BTreeMap::new();
        for (file_id, node) in &self.sites {
            let site_file = ws.file(*file_id);
            let (value, ty) = if *file_id == self.file.id {
                (
                    src[self.init.byte_range()].to_string(),
                    self.declared_type.clone().map(|r| src[r].to_string()),
                )
            } else {
                let t = Transplant {
                    ws,
                    index: cx.index,
                    file: self.file.id,
                    target: (!site_file.external_test).then_some(site_file.package),
                    target_import_path: ws.package(site_file.package).import_path.clone(),
                    source_qualifier: ws
                        .qualifier_for(*file_id, self.file.package)
                        .unwrap_or_else(|| ws.package(self.file.package).name.clone()),
                    keep: Vec::new(),
                };
                let list = needed.entry(*file_id).or_default();
                let mut render = |range: Range<usize>| {
                    let out = t.render(range, Vec::new());
                    list.extend(out.imports);
                    if out.uses_source {
                        list.push((ws.package(self.file.package).import_path.clone(), None));
                    }
                    out.text
                };
                let value = render(self.init.byte_range());
                let ty = self.declared_type.clone().map(&mut render);
                (value, ty)
            };
            let (text, kind) = match ty {
                Some(ty) if ty.starts_with('*') || ty.starts_with("func") || ty.starts_with("<-") => {
                    (format!("({ty})({value})"), "call_expression")
                }
                Some(ty) => (format!("{ty}({value})"), "call_expression"),
                None => (value, self.init.kind()),
            };
            plan.push(Change::span(
                &site_file.path,
                &site_file.source,
                node.byte_range(),
                wrap_for_site(&text, kind, *node),
                format!("inline {}", self.name),
            ));
            if node.kind() == "selector_expression" {
                dead.entry(*file_id).or_default().push(node.byte_range());
            }
            plan.touch_package(ws.package(site_file.package).import_path.clone());
        }

        if self.sites.len() > 1 && contains_call(self.init) {
            plan.add_issue(
                Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!(
                        "initializer of {} is now evaluated at each of {} uses",
                        self.name,
                        self.sites.len()
                    ),
                )
                .at(&self.file.path, Some(self.file.line_of(self.init.start_byte()))),
            );
        }

        match &self.removal {
            Some(removal) => {
                for range in tidy_removals(src, vec![removal.clone()]) {
                    dead.entry(self.file.id).or_default().push(range.clone());
                    plan.push(Change::delete(
                        &self.file.path,
                        src,
                        range,
                        format!("inline {}: remove declaration", self.name),
                    ));
                }
            }
            None => plan.add_issue(Issue::info(
                IssueKind::InvalidOperation,
                format!("declaration of {} kept: it declares other names", self.name),
            )),
        }

        let mut files: BTreeSet<FileId> = dead.keys().copied().collect();
        files.extend(needed.keys().copied());
        for file_id in files {
            let file = ws.file(file_id);
            let mut editor = ImportEditor::new(file);
            let list = needed.get(&file_id).cloned().unwrap_or_default();
            let keep: BTreeSet<String> = list.iter().map(|(p, _)| p.clone()).collect();
            if let Some(spans) = dead.get(&file_id) {
                prune_imports_except(ws, &mut editor, spans, &keep);
            }
            let own = &ws.package(file.package).import_path;
            for (path, alias) in &list {
                if path != own || file.external_test {
                    editor.add(path, alias.as_deref());
                }
            }
            plan.extend(editor.changes());
        }
        plan
    }
}

impl InlineVariable {
    fn target<'a>(&self, cx: &Context<'a>) -> Result<Inlinable<'a>, RefactorError> {
        match (self.line, &self.file, &self.package) {
            (Some(line), Some(file), _) => Inlinable::local(cx, file, line, &self.name),
            (Some(_), None, _) => Err(RefactorError::invalid(
                "a local variable needs both file and line",
            )),
            (None, _, Some(package)) => {
                let pkg = cx.package(package)?;
                let id = cx.resolver().resolve(pkg, &self.name)?;
                if cx.ws.symbol(id).kind != SymbolKind::Variable {
                    return Err(RefactorError::invalid(format!(
                        "{} is a {}, not a variable",
                        self.name,
                        cx.ws.symbol(id).kind
                    )));
                }
                Inlinable::package_level(cx, id)
            }
            (None, _, None) => Err(RefactorError::invalid(
                "inline-variable needs a package, or a file and line",
            )),
        }
    }
}

fn check_visibility(cx: &Context<'_>, v: &Inlinable<'_>) -> Result<(), RefactorError> {
    let ws = cx.ws;
    for (file_id, node) in &v.sites {
        let site_file = ws.file(*file_id);
        if *file_id == v.file.id || (site_file.package == v.file.package && !site_file.external_test) {
            continue;
        }
        let t = Transplant {
            ws,
            index: cx.index,
            file: v.file.id,
            target: (!site_file.external_test).then_some(site_file.package),
            target_import_path: ws.package(site_file.package).import_path.clone(),
            source_qualifier: ws.package(v.file.package).name.clone(),
            keep: Vec::new(),
        };
        let out = t.render(v.init.byte_range(), Vec::new());
        if let Some(name) = out.unexported.first() {
            return Err(RefactorError::visibility(format!(
                "the initializer of {} refers to unexported {name}",
                v.name
            ))
            .at(&site_file.path, Some(site_file.line_of(node.start_byte()))));
        }
    }
    Ok(())
}

impl Operation for InlineVariable {
    fn kind(&self) -> OperationKind {
        OperationKind::InlineVariable
    }

    fn describe(&self) -> String {
        format!("inline variable {}", self.name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let v = self.target(cx)?;
        check_visibility(cx, &v)
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let v = self.target(cx)?;
        Ok(v.plan(cx, Plan::for_operation(self.clone().into())))
    }
}

impl InlineConstant {
    fn target<'a>(&self, cx: &Context<'a>) -> Result<Inlinable<'a>, RefactorError> {
        let ws: &Workspace = cx.ws;
        let pkg = cx.package(&self.package)?;
        let id = cx.resolver().resolve(pkg, &self.name)?;
        let sym = ws.symbol(id);
        if sym.kind != SymbolKind::Constant {
            return Err(RefactorError::invalid(format!(
                "{} is a {}, not a constant",
                self.name, sym.kind
            )));
        }
        let v = Inlinable::package_level(cx, id)?;
        if uses_iota(v.init, &v.file.source) {
            return Err(RefactorError::invalid(format!(
                "{} depends on iota and cannot be inlined",
                self.name
            ))
            .at(&v.file.path, Some(v.file.line_of(sym.offset))));
        }
        Ok(v)
    }
}

impl Operation for InlineConstant {
    fn kind(&self) -> OperationKind {
        OperationKind::InlineConstant
    }

    fn describe(&self) -> String {
        format!("inline constant {}", self.name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let v = self.target(cx)?;
        check_visibility(cx, &v)
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let v = self.target(cx)?;
        Ok(v.plan(cx, Plan::for_operation(self.clone().into())))
    }
}
