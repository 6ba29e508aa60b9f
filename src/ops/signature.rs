//! Change-signature: rewrite a function's or method's parameter and result
//! lists together with its call sites, its return statements and, for
//! interface methods, every implementation.

use crate::error::RefactorError;
use crate::ops::common::{call_of, check_identifier, ImportEditor, PendingEdits};
use crate::ops::{Context, Operation, OperationKind, Scope};
use crate::plan::{Issue, IssueKind, Plan};
use crate::ts::nodes;
use crate::ts::validator::{validate_snippet, SnippetCategory};
use crate::workspace::{
    default_package_name, FileId, Param, Signature, SymbolId, SymbolKind, Workspace,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

/// Standard-library packages recognized by their qualifier when a default
/// value or a new type spelling needs an import.
const STD_PACKAGES: &[&str] = &[
    "bufio",
    "bytes",
    "context",
    "encoding/json",
    "errors",
    "fmt",
    "io",
    "log",
    "net/http",
    "os",
    "path/filepath",
    "regexp",
    "sort",
    "strconv",
    "strings",
    "sync",
    "time",
];

/// Rewrite the signature of `name` (`Func` or `Type.Method`).
///
/// At most one parameter and one result may be added or removed per
/// request, since call sites are mapped positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignature {
    #[serde(default)]
    pub package: Option<String>,
    pub name: String,
    /// Parameter spellings, e.g. `ctx context.Context`.
    pub new_params: Vec<String>,
    /// Result spellings; empty keeps the current results.
    #[serde(default)]
    pub new_returns: Vec<String>,
    #[serde(default = "workspace_scope")]
    pub scope: Scope,
    #[serde(default)]
    pub propagate_to_interface: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub new_param_position: Option<usize>,
    #[serde(default)]
    pub removed_param_index: Option<usize>,
    #[serde(default)]
    pub new_return_position: Option<usize>,
    #[serde(default)]
    pub removed_return_index: Option<usize>,
    #[serde(default)]
    pub default_return_value: Option<String>,
}

fn workspace_scope() -> Scope {
    Scope::Workspace
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ListEdit {
    Keep,
    Insert(usize, String),
    Remove(usize),
}

impl ListEdit {
    fn apply(&self, mut items: Vec<String>) -> Vec<String> {
        match self {
            ListEdit::Keep => {}
            ListEdit::Insert(at, value) => items.insert((*at).min(items.len()), value.clone()),
            ListEdit::Remove(at) => {
                if *at < items.len() {
                    items.remove(*at);
                }
            }
        }
        items
    }

    /// Whether a list of `len` items can take this edit.
    fn fits(&self, len: usize) -> bool {
        match self {
            ListEdit::Keep => true,
            ListEdit::Insert(at, _) => *at <= len,
            ListEdit::Remove(at) => *at < len,
        }
    }
}

/// Everything derived from the request and the current declaration.
struct Rewrite {
    params: Vec<String>,
    /// Parameter list as the caller spelled it, parenthesized.
    params_text: String,
    new_params: Vec<Param>,
    returns: Vec<String>,
    new_results: Vec<Param>,
    old_returns: usize,
    args: ListEdit,
    results: ListEdit,
}

/// Leading identifiers followed by `.` that are not themselves selected
/// from something: `context.TODO()` yields `context`.
fn qualifiers(text: &str) -> BTreeSet<String> {
    let bytes = text.as_bytes();
    let mut out = BTreeSet::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if matches!(b, b'"' | b'`' | b'\'') {
            quote = Some(b);
            i += 1;
            continue;
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let selected = start > 0 && bytes[start - 1] == b'.';
            let selects = bytes.get(i) == Some(&b'.')
                && bytes
                    .get(i + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_');
            if !selected && selects {
                out.insert(text[start..i].to_string());
            }
            continue;
        }
        i += 1;
    }
    out
}

fn import_for_qualifier(ws: &Workspace, qualifier: &str) -> Option<String> {
    if let Some(pkg) = ws.packages().iter().find(|p| p.name == qualifier) {
        return Some(pkg.import_path.clone());
    }
    STD_PACKAGES
        .iter()
        .find(|p| default_package_name(p) == qualifier)
        .map(|p| p.to_string())
}

/// Queue imports `file` needs for the qualifiers used in `texts`.
fn require_imports<'a>(
    ws: &'a Workspace,
    editors: &mut BTreeMap<FileId, ImportEditor<'a>>,
    file: FileId,
    texts: &[&str],
) {
    let source = ws.file(file);
    let own = &ws.package(source.package).import_path;
    for text in texts {
        for q in qualifiers(text) {
            if ws.import_for_name(file, &q).is_some() {
                continue;
            }
            let Some(path) = import_for_qualifier(ws, &q) else {
                continue;
            };
            if &path == own && !source.external_test {
                continue;
            }
            editors
                .entry(file)
                .or_insert_with(|| ImportEditor::new(source))
                .add(&path, None);
        }
    }
}

/// `(a, b)` for several or named results, `T` for a single unnamed one.
fn render_results(returns: &[String]) -> String {
    match returns {
        [] => String::new(),
        [single] if !single.trim().contains(char::is_whitespace) => single.trim().to_string(),
        _ => format!("({})", returns.join(", ")),
    }
}

fn expression_list(node: Node<'_>) -> Vec<Node<'_>> {
    if node.kind() == "expression_list" {
        nodes::named_children(node)
    } else {
        vec![node]
    }
}

/// Top-level `return` statements of a body, skipping function literals.
fn returns_of(body: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "func_literal" => {}
            "return_statement" => out.push(node),
            _ => stack.extend(nodes::named_children(node)),
        }
    }
    out
}

impl ChangeSignature {
    fn resolve(&self, cx: &Context<'_>) -> Result<SymbolId, RefactorError> {
        let resolver = cx.resolver();
        if let Some((ty, method)) = self.name.split_once('.') {
            return match &self.package {
                Some(pkg) => resolver.resolve_method(cx.package(pkg)?, ty, method),
                None => resolver.resolve_method_anywhere(ty, method),
            };
        }
        let id = match &self.package {
            Some(pkg) => resolver.resolve(cx.package(pkg)?, &self.name)?,
            None => {
                let found: Vec<SymbolId> = resolver
                    .resolve_everywhere(&self.name)
                    .into_iter()
                    .filter(|id| cx.ws.symbol(*id).kind == SymbolKind::Function)
                    .collect();
                match found.as_slice() {
                    [only] => *only,
                    [] => {
                        let functions: BTreeSet<&str> = cx
                            .ws
                            .symbols()
                            .iter()
                            .filter(|s| s.kind == SymbolKind::Function && s.receiver.is_none())
                            .map(|s| s.name.as_str())
                            .collect();
                        return Err(RefactorError::not_found(&self.name, "workspace", functions));
                    }
                    _ => {
                        return Err(RefactorError::invalid(format!(
                            "{} is declared in {} packages; name one",
                            self.name,
                            found.len()
                        )))
                    }
                }
            }
        };
        if cx.ws.symbol(id).kind != SymbolKind::Function {
            return Err(RefactorError::invalid(format!(
                "{} is a {}, not a function",
                self.name,
                cx.ws.symbol(id).kind
            )));
        }
        Ok(id)
    }

    /// The target plus every declaration that must keep the same shape.
    fn targets(&self, cx: &Context<'_>, target: SymbolId) -> Vec<SymbolId> {
        let ws = cx.ws;
        let resolver = cx.resolver();
        let sym = ws.symbol(target);
        let mut out = vec![target];
        let with_implementations = |iface: SymbolId, out: &mut Vec<SymbolId>| {
            let method = resolver
                .interface_method_set(iface)
                .into_iter()
                .find(|m| ws.symbol(*m).name == sym.name);
            out.extend(method);
            for ty in resolver.find_interface_implementations(iface) {
                out.extend(
                    resolver
                        .method_set(ty)
                        .into_iter()
                        .find(|m| ws.symbol(*m).name == sym.name),
                );
            }
        };
        if sym.in_interface {
            if let Some(iface) = resolver.owner_type(target) {
                with_implementations(iface, &mut out);
            }
        } else if sym.kind == SymbolKind::Method && self.propagate_to_interface {
            if let Some(owner) = resolver.owner_type(target) {
                for iface in resolver.interfaces_implemented_by(owner) {
                    with_implementations(iface, &mut out);
                }
            }
        }
        let mut seen = BTreeSet::new();
        out.retain(|id| seen.insert(*id));
        out
    }

    fn rewrite(&self, old: &Signature) -> Result<Rewrite, RefactorError> {
        let render = |list: &[Param]| -> Vec<String> {
            list.iter()
                .map(|p| Signature::render_list(std::slice::from_ref(p)))
                .collect()
        };
        let old_params = render(&old.params);
        let spelled: Vec<&str> = self.new_params.iter().map(|p| p.trim()).collect();
        if spelled.iter().any(|p| p.is_empty()) {
            return Err(RefactorError::invalid("empty parameter spelling"));
        }
        let params_text = spelled.join(", ");
        let new_params = Signature::parse_list(&params_text).ok_or_else(|| {
            RefactorError::invalid(format!("'{params_text}' is not a parameter list"))
        })?;
        let params = render(&new_params);

        let new_results = if !self.new_returns.is_empty() {
            let spelled: Vec<&str> = self.new_returns.iter().map(|r| r.trim()).collect();
            let text = spelled.join(", ");
            Signature::parse_list(&text).ok_or_else(|| {
                RefactorError::invalid(format!("'{text}' is not a result list"))
            })?
        } else if let Some(at) = self.removed_return_index {
            if at >= old.results.len() {
                return Err(RefactorError::invalid(format!(
                    "result position out of range for {} results",
                    old.results.len()
                )));
            }
            let mut kept = old.results.clone();
            kept.remove(at);
            kept
        } else if self.new_return_position.is_some() {
            return Err(RefactorError::invalid(
                "adding a result needs its type in new_returns",
            ));
        } else {
            old.results.clone()
        };
        let returns = render(&new_results);

        let args = match params.len() as isize - old_params.len() as isize {
            0 => ListEdit::Keep,
            1 => {
                let at = self.new_param_position.ok_or_else(|| {
                    RefactorError::invalid("adding a parameter needs new_param_position")
                })?;
                let value = self.default_value.clone().ok_or_else(|| {
                    RefactorError::invalid("adding a parameter needs default_value")
                })?;
                ListEdit::Insert(at, value)
            }
            -1 => {
                let at = match self.removed_param_index {
                    Some(at) => at,
                    None => (0..old_params.len())
                        .find(|i| {
                            let mut rest = old_params.clone();
                            rest.remove(*i);
                            rest == params
                        })
                        .ok_or_else(|| {
                            RefactorError::invalid(
                                "cannot tell which parameter was removed; give removed_param_index",
                            )
                        })?,
                };
                ListEdit::Remove(at)
            }
            _ => {
                return Err(RefactorError::invalid(
                    "add or remove one parameter at a time",
                ))
            }
        };
        if !args.fits(old_params.len()) {
            return Err(RefactorError::invalid(format!(
                "parameter position out of range for {} parameters",
                old_params.len()
            )));
        }

        let results = match returns.len() as isize - old.results.len() as isize {
            0 => ListEdit::Keep,
            1 => {
                let at = self.new_return_position.unwrap_or(old.results.len());
                let value = self.default_return_value.clone().ok_or_else(|| {
                    RefactorError::invalid("adding a result needs default_return_value")
                })?;
                ListEdit::Insert(at, value)
            }
            -1 => ListEdit::Remove(self.removed_return_index.ok_or_else(|| {
                RefactorError::invalid("removing a result needs removed_return_index")
            })?),
            _ => return Err(RefactorError::invalid("add or remove one result at a time")),
        };
        if !results.fits(old.results.len()) {
            return Err(RefactorError::invalid(format!(
                "result position out of range for {} results",
                old.results.len()
            )));
        }
        Ok(Rewrite {
            params,
            params_text: format!("({params_text})"),
            new_params,
            returns,
            new_results,
            old_returns: old.results.len(),
            args,
            results,
        })
    }

    fn signature(cx: &Context<'_>, id: SymbolId) -> Result<Signature, RefactorError> {
        let sym = cx.ws.symbol(id);
        sym.signature.clone().ok_or_else(|| {
            RefactorError::invalid(format!("{} has no signature", sym.qualified_name()))
        })
    }
}

impl Operation for ChangeSignature {
    fn kind(&self) -> OperationKind {
        OperationKind::ChangeSignature
    }

    fn describe(&self) -> String {
        format!("change signature of {}", self.name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let target = self.resolve(cx)?;
        let rewrite = self.rewrite(&Self::signature(cx, target)?)?;
        for param in &rewrite.params {
            match param.split_once(char::is_whitespace) {
                Some((name, ty)) if !ty.trim().is_empty() => check_identifier(name)?,
                Some(_) => return Err(RefactorError::invalid(format!("bad parameter '{param}'"))),
                None if param.is_empty() => {
                    return Err(RefactorError::invalid("empty parameter spelling"))
                }
                None => {}
            }
        }
        for value in [&self.default_value, &self.default_return_value]
            .into_iter()
            .flatten()
        {
            validate_snippet(value, SnippetCategory::Expression).map_err(|_| {
                RefactorError::invalid(format!("'{value}' is not an expression"))
            })?;
        }
        let shape = Self::signature(cx, target)?;
        for id in self.targets(cx, target) {
            let other = Self::signature(cx, id)?;
            if other.params.len() != shape.params.len() || other.results.len() != shape.results.len() {
                let sym = cx.ws.symbol(id);
                let file = cx.ws.file(sym.file);
                return Err(RefactorError::invalid(format!(
                    "{} does not match the signature being changed",
                    sym.qualified_name()
                ))
                .at(&file.path, Some(file.line_of(sym.offset))));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        let target = self.resolve(cx)?;
        let rw = self.rewrite(&Self::signature(cx, target)?)?;
        let targets = self.targets(cx, target);

        let params_text = rw.params_text.clone();
        let results_text = render_results(&rw.returns);
        let mut pending: BTreeMap<FileId, PendingEdits> = BTreeMap::new();
        let mut editors: BTreeMap<FileId, ImportEditor<'_>> = BTreeMap::new();
        let mut return_sites: Vec<(FileId, Node<'_>)> = Vec::new();
        let mut calls: Vec<(FileId, Node<'_>, bool)> = Vec::new();
        let mut seen = BTreeSet::new();

        for id in &targets {
            let sym = ws.symbol(*id);
            let sig = Self::signature(cx, *id)?;
            let file = ws.file(sym.file);
            let src = &file.source;
            plan.touch_package(ws.package(sym.package).import_path.clone());
            let edits = pending.entry(file.id).or_default();

            if !Signature::same_list(&sig.params, &rw.new_params) {
                edits.push(sig.params_range.clone(), params_text.clone(), "parameters");
            }
            match (&sig.results_range, results_text.is_empty()) {
                (Some(r), true) => edits.push(sig.params_range.end..r.end, "", "result parameters"),
                (Some(_), false) if Signature::same_list(&sig.results, &rw.new_results) => {}
                (Some(r), false) if src[r.clone()] != results_text => {
                    edits.push(r.clone(), results_text.clone(), "result parameters")
                }
                (None, false) => edits.push(
                    sig.params_range.end..sig.params_range.end,
                    format!(" {results_text}"),
                    "result parameters",
                ),
                _ => {}
            }
            let typed: Vec<&str> = rw
                .params
                .iter()
                .chain(&rw.returns)
                .map(String::as_str)
                .collect();
            require_imports(ws, &mut editors, file.id, &typed);

            if rw.results != ListEdit::Keep && !sym.in_interface {
                let body = file
                    .root()
                    .descendant_for_byte_range(sym.offset, sym.offset + sym.name.len())
                    .and_then(|n| {
                        nodes::ancestor_of_kind(n, &["function_declaration", "method_declaration"])
                    })
                    .and_then(|d| d.child_by_field_name("body"));
                if let Some(body) = body {
                    return_sites.extend(returns_of(body).into_iter().map(|r| (file.id, r)));
                }
            }

            for r in cx.index.uses(*id) {
                if self.scope == Scope::Package && r.package != sym.package {
                    continue;
                }
                if !seen.insert((r.file, r.offset)) {
                    continue;
                }
                let site = ws.file(r.file);
                match call_of(site.root(), r.offset, r.name.len()) {
                    Some(call) => calls.push((r.file, call, r.ambiguous)),
                    None => plan.add_issue(
                        Issue::warning(
                            IssueKind::CompilationSuspect,
                            format!("{} used as a value; not rewritten", r.name),
                        )
                        .at(&r.path, Some(r.line)),
                    ),
                }
            }
        }

        calls.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.start_byte().cmp(&a.1.start_byte()))
                .then(a.1.end_byte().cmp(&b.1.end_byte()))
        });
        for (file_id, call, ambiguous) in &calls {
            let file = ws.file(*file_id);
            let src = &file.source;
            let edits = pending.entry(*file_id).or_default();
            let line = file.line_of(call.start_byte());
            plan.touch_package(ws.package(file.package).import_path.clone());
            if *ambiguous {
                plan.add_issue(
                    Issue::warning(
                        IssueKind::CompilationSuspect,
                        "call bound by name only; receiver type unknown",
                    )
                    .at(&file.path, Some(line)),
                );
            }

            if rw.args != ListEdit::Keep {
                if let Some(list) = call.child_by_field_name("arguments") {
                    let args = nodes::named_children(list);
                    let spread = args.iter().any(|a| a.kind() == "variadic_argument");
                    if spread || !rw.args.fits(args.len()) {
                        plan.add_issue(
                            Issue::warning(
                                IssueKind::CompilationSuspect,
                                "argument list does not match the parameters; not rewritten",
                            )
                            .at(&file.path, Some(line)),
                        );
                    } else {
                        let texts: Vec<String> = args
                            .iter()
                            .map(|a| edits.text(src, a.byte_range()))
                            .collect();
                        let texts = rw.args.apply(texts);
                        edits.push(
                            list.byte_range(),
                            format!("({})", texts.join(", ")),
                            "argument list",
                        );
                        if let ListEdit::Insert(_, value) = &rw.args {
                            require_imports(ws, &mut editors, *file_id, &[value.as_str()]);
                        }
                    }
                }
            }

            if rw.results == ListEdit::Keep {
                continue;
            }
            let Some(stmt) = call
                .parent()
                .filter(|p| p.kind() == "expression_list" && p.named_child_count() == 1)
                .and_then(|p| p.parent().filter(|s| s.child_by_field_name("right") == Some(p)))
                .filter(|s| matches!(s.kind(), "assignment_statement" | "short_var_declaration"))
            else {
                continue;
            };
            let Some(left) = stmt.child_by_field_name("left") else {
                continue;
            };
            let names: Vec<String> = expression_list(left)
                .iter()
                .map(|n| nodes::text(*n, src).to_string())
                .collect();
            if names.len() != rw.old_returns {
                continue;
            }
            let names = match &rw.results {
                ListEdit::Insert(at, _) => ListEdit::Insert(*at, "_".to_string()).apply(names),
                other => other.apply(names),
            };
            let call_text = edits.text(src, call.byte_range());
            let text = if names.is_empty() {
                call_text
            } else {
                let op = match stmt.child_by_field_name("operator") {
                    Some(op) => nodes::text(op, src).to_string(),
                    None if stmt.kind() == "short_var_declaration" && names.iter().all(|n| n == "_") => {
                        "=".to_string()
                    }
                    None if stmt.kind() == "short_var_declaration" => ":=".to_string(),
                    None => "=".to_string(),
                };
                format!("{} {op} {call_text}", names.join(", "))
            };
            edits.push(stmt.byte_range(), text, "call site results");
        }

        for (file_id, ret) in &return_sites {
            let file = ws.file(*file_id);
            let src = &file.source;
            let values = nodes::named_children(*ret)
                .into_iter()
                .next()
                .map(expression_list)
                .unwrap_or_default();
            if values.is_empty() || values.len() != rw.old_returns {
                continue;
            }
            let edits = pending.entry(*file_id).or_default();
            let texts: Vec<String> = values
                .iter()
                .map(|v| edits.text(src, v.byte_range()))
                .collect();
            let texts = rw.results.apply(texts);
            let text = if texts.is_empty() {
                "return".to_string()
            } else {
                format!("return {}", texts.join(", "))
            };
            edits.push(ret.byte_range(), text, "return arguments");
            if let ListEdit::Insert(_, value) = &rw.results {
                require_imports(ws, &mut editors, *file_id, &[value.as_str()]);
            }
        }

        for (file_id, edits) in pending {
            let file = ws.file(file_id);
            plan.extend(edits.into_changes(&file.path, &file.source));
        }
        for editor in editors.values() {
            plan.extend(editor.changes());
        }
        debug!(
            target = %ws.symbol(target).qualified_name(),
            declarations = targets.len(),
            calls = calls.len(),
            "signature change planned"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};

    fn change(name: &str, params: &[&str]) -> ChangeSignature {
        ChangeSignature {
            package: None,
            name: name.into(),
            new_params: params.iter().map(|p| p.to_string()).collect(),
            new_returns: Vec::new(),
            scope: Scope::Workspace,
            propagate_to_interface: false,
            default_value: None,
            new_param_position: None,
            removed_param_index: None,
            new_return_position: None,
            removed_return_index: None,
            default_return_value: None,
        }
    }

    #[test]
    fn qualifier_scan() {
        let q = qualifiers("context.TODO()");
        assert_eq!(q.into_iter().collect::<Vec<_>>(), vec!["context"]);
        assert!(qualifiers("x.y.z").len() == 1);
        assert!(qualifiers("\"a.b\"").is_empty());
        assert!(qualifiers("[]string").is_empty());
    }

    #[test]
    fn add_parameter_with_default_updates_callers_and_imports() {
        let store = "package store\n\nfunc Save(id string) error { return nil }\n";
        let a = "package app\n\nimport \"example.com/m/store\"\n\nfunc A() {\n\tstore.Save(\"x\")\n}\n";
        let b = "package app\n\nimport \"example.com/m/store\"\n\nfunc B(id string) error {\n\treturn store.Save(id)\n}\n";
        let ws = workspace(&[("store/store.go", store), ("app/a.go", a), ("app/b.go", b)]);
        let mut op = change("Save", &["ctx context.Context", "id string"]);
        op.new_param_position = Some(0);
        op.default_value = Some("context.TODO()".into());
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert!(out["store/store.go"]
            .contains("func Save(ctx context.Context, id string) error { return nil }"));
        assert!(out["store/store.go"].contains("\"context\""));
        assert!(out["app/a.go"].contains("store.Save(context.TODO(), \"x\")"));
        assert!(out["app/b.go"].contains("store.Save(context.TODO(), id)"));
        for file in ["app/a.go", "app/b.go"] {
            assert!(out[file].contains("\"context\""), "{file} lacks the import");
        }
    }

    #[test]
    fn remove_result_rewrites_returns_and_assignments() {
        let src = "package repo\n\ntype Data struct{}\n\ntype R struct{}\n\nfunc (r *R) Load() (Data, error) {\n\tif r == nil {\n\t\treturn Data{}, nil\n\t}\n\tf := func() error { return nil }\n\t_ = f\n\treturn Data{}, nil\n}\n\nfunc Use(r *R) {\n\td, err := r.Load()\n\t_ = err\n\t_ = d\n}\n";
        let ws = workspace(&[("repo/repo.go", src)]);
        let mut op = change("R.Load", &[]);
        op.new_returns = vec!["Data".into()];
        op.removed_return_index = Some(1);
        let p = plan(&ws, op).unwrap();
        assert_eq!(
            applied(&ws, &p)["repo/repo.go"],
            "package repo\n\ntype Data struct{}\n\ntype R struct{}\n\nfunc (r *R) Load() Data {\n\tif r == nil {\n\t\treturn Data{}\n\t}\n\tf := func() error { return nil }\n\t_ = f\n\treturn Data{}\n}\n\nfunc Use(r *R) {\n\td := r.Load()\n\t_ = err\n\t_ = d\n}\n"
        );
    }

    #[test]
    fn add_result_extends_assignment_targets() {
        let src = "package m\n\nfunc Pair() (int, int) {\n\treturn 1, 2\n}\n\nfunc Use() {\n\tvar a, b int\n\ta, b = Pair()\n\tPair()\n\t_, _ = a, b\n}\n";
        let ws = workspace(&[("m/m.go", src)]);
        let mut op = change("Pair", &[]);
        op.new_returns = vec!["int".into(), "int".into(), "error".into()];
        op.new_return_position = Some(2);
        op.default_return_value = Some("nil".into());
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["m/m.go"];
        assert!(out.contains("func Pair() (int, int, error) {\n\treturn 1, 2, nil\n}"));
        assert!(out.contains("\ta, b, _ = Pair()\n\tPair()\n"));
    }

    #[test]
    fn identical_signature_is_empty() {
        let src = "package m\n\nfunc F(a int) int { return a }\n\nvar _ = F(1)\n";
        let ws = workspace(&[("m/m.go", src)]);
        let p = plan(&ws, change("F", &["a int"])).unwrap();
        assert!(p.changes.is_empty());
    }

    #[test]
    fn grouped_parameters_are_identical() {
        let src = "package m\n\nfunc F(a, b int) int { return a + b }\n\nvar _ = F(1, 2)\n";
        let ws = workspace(&[("m/m.go", src)]);
        for params in [&["a, b int"][..], &["a int", "b int"][..]] {
            let p = plan(&ws, change("F", params)).unwrap();
            assert!(p.changes.is_empty(), "{params:?}: {:?}", p.changes);
        }
    }

    #[test]
    fn removing_only_result_leaves_bare_calls() {
        let src = "package m\n\nfunc F() error {\n\treturn nil\n}\n\nfunc G() {\n\terr := F()\n\tvar e error\n\te = F()\n}\n";
        let ws = workspace(&[("m/m.go", src)]);
        let mut op = change("F", &[]);
        op.removed_return_index = Some(0);
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["m/m.go"];
        assert!(out.contains("func F() {\n\treturn\n}"), "{out}");
        assert!(out.contains("\tF()\n\tvar e error\n\tF()\n"), "{out}");
        assert!(!out.contains(":="));
    }

    #[test]
    fn adding_result_without_type_is_invalid() {
        let src = "package m\n\nfunc F() {}\n";
        let ws = workspace(&[("m/m.go", src)]);
        let mut op = change("F", &[]);
        op.new_return_position = Some(0);
        op.default_return_value = Some("nil".into());
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::InvalidOperation);
    }

    #[test]
    fn unknown_function_lists_candidates() {
        let src = "package m\n\nfunc Load() {}\n\nfunc Save() {}\n";
        let ws = workspace(&[("m/m.go", src)]);
        match plan(&ws, change("Lode", &[])).unwrap_err() {
            RefactorError::SymbolNotFound { available, .. } => {
                assert_eq!(available, vec!["Load".to_string(), "Save".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn removed_parameter_is_derived() {
        let src = "package m\n\nfunc F(a int, b string) {}\n\nfunc G() {\n\tF(1, \"x\")\n}\n";
        let ws = workspace(&[("m/m.go", src)]);
        let p = plan(&ws, change("F", &["b string"])).unwrap();
        let out = &applied(&ws, &p)["m/m.go"];
        assert!(out.contains("func F(b string) {}"));
        assert!(out.contains("\tF(\"x\")\n"));
    }

    #[test]
    fn interface_method_updates_implementations() {
        let src = "package shape\n\ntype Shape interface {\n\tArea() float64\n}\n\ntype Sq struct{ s float64 }\n\nfunc (q Sq) Area() float64 { return q.s * q.s }\n\nfunc Of(q Sq) float64 {\n\treturn q.Area()\n}\n";
        let ws = workspace(&[("shape/shape.go", src)]);
        let mut op = change("Shape.Area", &["scale float64"]);
        op.new_param_position = Some(0);
        op.default_value = Some("1".into());
        let p = plan(&ws, op).unwrap();
        let out = &applied(&ws, &p)["shape/shape.go"];
        assert!(out.contains("\tArea(scale float64) float64\n"));
        assert!(out.contains("func (q Sq) Area(scale float64) float64"));
        assert!(out.contains("return q.Area(1)"));
    }

    #[test]
    fn adding_parameter_without_default_is_invalid() {
        let src = "package m\n\nfunc F() {}\n";
        let ws = workspace(&[("m/m.go", src)]);
        let mut op = change("F", &["n int"]);
        op.new_param_position = Some(0);
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::InvalidOperation);
    }
}
