//! Scope-aware walk of one file that binds identifier occurrences to
//! workspace symbols.
//!
//! Binding is syntactic: locals shadow package-level names, import names
//! qualify selectors, and member selections (`x.m`) are bound through a
//! best-effort static type of `x`. When that type cannot be inferred the
//! member is bound by name to every workspace method or field so spelled,
//! and the occurrence is flagged ambiguous.

use crate::ts::nodes;
use crate::workspace::{
    FileId, PackageId, SourceFile, SymbolId, SymbolKind, TypeHint, TypeRef, Workspace,
};
use std::collections::HashMap;
use std::ops::Range;
use tree_sitter::Node;

/// Embedded-field promotion depth followed when looking up members.
const MAX_EMBED_DEPTH: usize = 3;

const BUILTIN_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

/// Static type of an expression as far as the walker can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Unknown,
    /// Builtin, composite or declared outside the workspace.
    External,
    Named(SymbolId),
}

/// One bound identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub symbol: SymbolId,
    pub offset: usize,
    pub len: usize,
    pub ambiguous: bool,
    /// Span of the package qualifier of `pkg.Name` forms.
    pub qualifier: Option<Range<usize>>,
}

/// Workspace-wide lookups shared by every file walk.
pub struct Binder<'w> {
    ws: &'w Workspace,
    members_by_name: HashMap<&'w str, Vec<SymbolId>>,
}

impl<'w> Binder<'w> {
    pub fn new(ws: &'w Workspace) -> Self {
        let mut members_by_name: HashMap<&'w str, Vec<SymbolId>> = HashMap::new();
        for id in ws.symbol_ids() {
            let sym = ws.symbol(id);
            if matches!(sym.kind, SymbolKind::Method | SymbolKind::Field) {
                members_by_name.entry(sym.name.as_str()).or_default().push(id);
            }
        }
        Self { ws, members_by_name }
    }

    pub fn workspace(&self) -> &'w Workspace {
        self.ws
    }

    /// Every method or field named `name`.
    pub fn members_named(&self, name: &str) -> &[SymbolId] {
        self.members_by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Bind a type spelled in `file`.
    pub fn type_ref_in(&self, file: FileId, r: &TypeRef) -> Ty {
        let ws = self.ws;
        match &r.qualifier {
            Some(q) => match ws.import_for_name(file, q) {
                Some(spec) => match ws.package_by_import_path(&spec.path) {
                    Some(pkg) => ws
                        .package(pkg)
                        .symbols
                        .types
                        .get(&r.name)
                        .map_or(Ty::Unknown, |id| Ty::Named(*id)),
                    None => Ty::External,
                },
                None => Ty::Unknown,
            },
            None => {
                let f = ws.file(file);
                if BUILTIN_TYPES.contains(&r.name.as_str()) {
                    return Ty::External;
                }
                if f.external_test {
                    return Ty::Unknown;
                }
                if let Some(id) = ws.package(f.package).symbols.types.get(&r.name) {
                    return Ty::Named(*id);
                }
                self.dot_imported(file, &r.name, true)
                    .map_or(Ty::Unknown, Ty::Named)
            }
        }
    }

    /// Bind a stored hint relative to the file it was recorded in.
    pub fn hint_in(&self, file: FileId, hint: &TypeHint) -> Ty {
        match hint {
            TypeHint::Unknown => Ty::Unknown,
            TypeHint::Named(r) => self.type_ref_in(file, r),
            TypeHint::CallResult(r) => match self.ws.resolve_function_ref(file, r) {
                Some(func) => self.result_ty(func, 0),
                None => self.type_ref_in(file, r),
            },
        }
    }

    /// Type of result `idx` of a function or method.
    pub fn result_ty(&self, func: SymbolId, idx: usize) -> Ty {
        let sym = self.ws.symbol(func);
        let Some(result) = sym.signature.as_ref().and_then(|s| s.results.get(idx)) else {
            return Ty::Unknown;
        };
        match TypeRef::parse(&result.ty) {
            Some(r) => self.type_ref_in(sym.file, &r),
            None => Ty::External,
        }
    }

    /// Type of a variable, constant or field symbol; types denote themselves.
    pub fn value_ty(&self, id: SymbolId) -> Ty {
        let sym = self.ws.symbol(id);
        match sym.kind {
            SymbolKind::Type | SymbolKind::Interface => Ty::Named(id),
            SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Field => {
                self.hint_in(sym.file, &sym.value_type)
            }
            SymbolKind::Function | SymbolKind::Method => Ty::Unknown,
        }
    }

    /// Method or field `name` of type `ty`, following embedded fields.
    pub fn find_member(&self, ty: SymbolId, name: &str) -> Option<SymbolId> {
        self.find_member_at(ty, name, 0)
    }

    fn find_member_at(&self, ty: SymbolId, name: &str, depth: usize) -> Option<SymbolId> {
        let sym = self.ws.symbol(ty);
        let table = &self.ws.package(sym.package).symbols;
        let direct = table
            .methods_of(&sym.name)
            .iter()
            .chain(table.fields_of(&sym.name))
            .copied()
            .find(|id| self.ws.symbol(*id).name == name);
        if direct.is_some() || depth >= MAX_EMBED_DEPTH {
            return direct;
        }
        sym.embeds.iter().find_map(|embed| match self.type_ref_in(sym.file, embed) {
            Ty::Named(inner) if inner != ty => self.find_member_at(inner, name, depth + 1),
            _ => None,
        })
    }

    /// Symbol `name` of a workspace package dot-imported by `file`.
    fn dot_imported(&self, file: FileId, name: &str, types_only: bool) -> Option<SymbolId> {
        let ws = self.ws;
        ws.file(file)
            .imports
            .specs
            .iter()
            .filter(|s| s.alias.as_deref() == Some("."))
            .filter_map(|s| ws.package_by_import_path(&s.path))
            .find_map(|pkg| {
                let table = &ws.package(pkg).symbols;
                if types_only {
                    table.types.get(name).copied()
                } else {
                    table.lookup(name)
                }
            })
    }
}

/// Walk `file` and return every occurrence that binds to a workspace symbol.
/// Declaring identifiers of package-level symbols are not reported.
pub fn bind_file(binder: &Binder<'_>, file: &SourceFile) -> Vec<Occurrence> {
    let mut walker = FileWalker {
        binder,
        ws: binder.ws,
        file,
        src: &file.source,
        scopes: Vec::new(),
        out: Vec::new(),
    };
    walker.walk_children(file.root());
    walker.out
}

struct FileWalker<'b, 'w> {
    binder: &'b Binder<'w>,
    ws: &'w Workspace,
    file: &'b SourceFile,
    src: &'b str,
    scopes: Vec<HashMap<String, Ty>>,
    out: Vec<Occurrence>,
}

impl<'b, 'w> FileWalker<'b, 'w> {
    fn walk(&mut self, node: Node<'b>) {
        match node.kind() {
            "package_clause" | "import_declaration" | "comment" | "label_name"
            | "field_identifier" | "package_identifier" | "break_statement"
            | "continue_statement" | "goto_statement" => {}
            "function_declaration" | "method_declaration" | "func_literal" => self.function(node),
            "block" | "for_statement" | "if_statement" | "expression_switch_statement"
            | "select_statement" | "expression_case" | "default_case" | "communication_case" => {
                self.scoped(|w| w.walk_children(node))
            }
            "type_switch_statement" => self.type_switch(node),
            "short_var_declaration" => self.short_var(node),
            "range_clause" | "receive_statement" => self.maybe_declaring(node),
            "var_declaration" | "const_declaration" => self.value_declaration(node),
            "type_declaration" => self.type_declaration(node),
            "parameter_declaration" | "variadic_parameter_declaration" | "field_declaration" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.walk(ty);
                }
            }
            "method_elem" | "method_spec" => {
                for field in ["parameters", "result"] {
                    if let Some(child) = node.child_by_field_name(field) {
                        self.walk(child);
                    }
                }
            }
            "selector_expression" => self.selector(node),
            "qualified_type" => self.qualified_type(node),
            "composite_literal" => self.composite(node),
            "identifier" => self.free(node, false),
            "type_identifier" => self.free(node, true),
            _ => self.walk_children(node),
        }
    }

    fn walk_children(&mut self, node: Node<'b>) {
        for child in nodes::named_children(node) {
            self.walk(child);
        }
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(HashMap::new());
        f(self);
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: Ty) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn local(&self, name: &str) -> Option<Ty> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn text(&self, node: Node<'_>) -> &'b str {
        nodes::text(node, self.src)
    }

    fn emit(&mut self, symbol: SymbolId, node: Node<'_>, ambiguous: bool, qualifier: Option<Range<usize>>) {
        self.out.push(Occurrence {
            symbol,
            offset: node.start_byte(),
            len: node.end_byte() - node.start_byte(),
            ambiguous,
            qualifier,
        });
    }

    fn function(&mut self, node: Node<'b>) {
        self.scoped(|w| {
            if let Some(tp) = node.child_by_field_name("type_parameters") {
                w.type_params(tp);
            }
            if let Some(recv) = node.child_by_field_name("receiver") {
                w.params(recv);
            }
            if let Some(params) = node.child_by_field_name("parameters") {
                w.params(params);
            }
            if let Some(result) = node.child_by_field_name("result") {
                if result.kind() == "parameter_list" {
                    w.params(result);
                } else {
                    w.walk(result);
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                w.walk(body);
            }
        });
    }

    fn params(&mut self, list: Node<'b>) {
        for decl in nodes::named_children(list) {
            let Some(ty) = decl.child_by_field_name("type") else {
                continue;
            };
            self.walk(ty);
            let bound = if decl.kind() == "variadic_parameter_declaration" {
                Ty::External
            } else {
                self.ty_of_type(ty)
            };
            for name in nodes::field_children(decl, "name") {
                let name = self.text(name);
                self.declare(name, bound);
            }
        }
    }

    fn type_params(&mut self, list: Node<'b>) {
        for decl in nodes::named_children(list) {
            for name in nodes::field_children(decl, "name") {
                let name = self.text(name);
                self.declare(name, Ty::Unknown);
            }
            if let Some(constraint) = decl.child_by_field_name("type") {
                self.walk(constraint);
            }
        }
    }

    fn short_var(&mut self, node: Node<'b>) {
        let values = node
            .child_by_field_name("right")
            .map(nodes::named_children)
            .unwrap_or_default();
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right);
        }
        let targets = node
            .child_by_field_name("left")
            .map(nodes::named_children)
            .unwrap_or_default();
        let types: Vec<Ty> = (0..targets.len())
            .map(|i| {
                if values.len() == targets.len() {
                    self.ty_of(values[i])
                } else if values.len() == 1 && values[0].kind() == "call_expression" {
                    self.call_result(values[0], i)
                } else {
                    Ty::Unknown
                }
            })
            .collect();
        for (target, ty) in targets.into_iter().zip(types) {
            if target.kind() == "identifier" {
                let name = self.text(target);
                self.declare(name, ty);
            } else {
                self.walk(target);
            }
        }
    }

    /// `range` clauses and select receives declare their left side only
    /// with `:=`.
    fn maybe_declaring(&mut self, node: Node<'b>) {
        if !nodes::has_token(node, ":=") {
            self.walk_children(node);
            return;
        }
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right);
        }
        if let Some(left) = node.child_by_field_name("left") {
            for target in nodes::named_children(left) {
                if target.kind() == "identifier" {
                    let name = self.text(target);
                    self.declare(name, Ty::Unknown);
                }
            }
        }
    }

    fn value_declaration(&mut self, node: Node<'b>) {
        let local = !self.scopes.is_empty();
        let spec_kind = if node.kind() == "var_declaration" {
            "var_spec"
        } else {
            "const_spec"
        };
        for spec in nodes::specs(node, spec_kind) {
            let ty_node = spec.child_by_field_name("type");
            if let Some(ty) = ty_node {
                self.walk(ty);
            }
            let values = spec
                .child_by_field_name("value")
                .map(nodes::named_children)
                .unwrap_or_default();
            for value in &values {
                self.walk(*value);
            }
            if !local {
                continue;
            }
            for (idx, name) in nodes::field_children(spec, "name").into_iter().enumerate() {
                let ty = match ty_node {
                    Some(t) => self.ty_of_type(t),
                    None => values.get(idx).map_or(Ty::Unknown, |v| self.ty_of(*v)),
                };
                let name = self.text(name);
                self.declare(name, ty);
            }
        }
    }

    fn type_declaration(&mut self, node: Node<'b>) {
        let local = !self.scopes.is_empty();
        let specs = nodes::specs(node, "type_spec")
            .into_iter()
            .chain(nodes::specs(node, "type_alias"));
        for spec in specs {
            if local {
                if let Some(name) = spec.child_by_field_name("name") {
                    let name = self.text(name);
                    self.declare(name, Ty::Unknown);
                }
            }
            self.scoped(|w| {
                if let Some(tp) = spec.child_by_field_name("type_parameters") {
                    w.type_params(tp);
                }
                if let Some(ty) = spec.child_by_field_name("type") {
                    w.walk(ty);
                }
            });
        }
    }

    fn type_switch(&mut self, node: Node<'b>) {
        self.scoped(|w| {
            if let Some(init) = node.child_by_field_name("initializer") {
                w.walk(init);
            }
            let aliases: Vec<&'b str> = node
                .child_by_field_name("alias")
                .map(nodes::named_children)
                .unwrap_or_default()
                .into_iter()
                .map(|a| w.text(a))
                .collect();
            if let Some(value) = node.child_by_field_name("value") {
                w.walk(value);
            }
            for clause in nodes::named_children(node) {
                if !matches!(clause.kind(), "type_case" | "default_case") {
                    continue;
                }
                w.scoped(|w| {
                    let types = nodes::field_children(clause, "type");
                    let bound = match types.as_slice() {
                        [single] => w.ty_of_type(*single),
                        _ => Ty::Unknown,
                    };
                    for alias in &aliases {
                        w.declare(alias, bound);
                    }
                    for child in nodes::named_children(clause) {
                        w.walk(child);
                    }
                });
            }
        });
    }

    fn selector(&mut self, node: Node<'b>) {
        let (Some(operand), Some(field)) = (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) else {
            self.walk_children(node);
            return;
        };
        let ws = self.ws;
        if operand.kind() == "identifier" {
            let qualifier = self.text(operand);
            if self.local(qualifier).is_none() {
                if let Some(spec) = ws.import_for_name(self.file.id, qualifier) {
                    if let Some(pkg) = ws.package_by_import_path(&spec.path) {
                        let name = self.text(field);
                        if let Some(id) = ws.package(pkg).symbols.lookup(name) {
                            self.emit(id, field, false, Some(operand.byte_range()));
                        }
                    }
                    return;
                }
            }
        }
        self.walk(operand);
        let ty = self.ty_of(operand);
        self.member(field, ty);
    }

    fn member(&mut self, field: Node<'b>, ty: Ty) {
        let name = self.text(field);
        match ty {
            Ty::Named(t) => {
                if let Some(id) = self.binder.find_member(t, name) {
                    self.emit(id, field, false, None);
                }
            }
            Ty::External => {}
            Ty::Unknown => {
                for id in self.binder.members_named(name).to_vec() {
                    self.emit(id, field, true, None);
                }
            }
        }
    }

    fn qualified_type(&mut self, node: Node<'b>) {
        let (Some(package), Some(name)) = (
            node.child_by_field_name("package"),
            node.child_by_field_name("name"),
        ) else {
            return;
        };
        let ws = self.ws;
        let qualifier = self.text(package);
        if let Some(pkg) = ws.package_for_qualifier(self.file.id, qualifier) {
            let type_name = self.text(name);
            if let Some(id) = ws.package(pkg).symbols.types.get(type_name).copied() {
                self.emit(id, name, false, Some(package.byte_range()));
            }
        }
    }

    fn composite(&mut self, node: Node<'b>) {
        let ty_node = node.child_by_field_name("type");
        if let Some(ty) = ty_node {
            self.walk(ty);
        }
        let (fields, elements) = match ty_node {
            Some(t) => (self.ty_of_type(t), self.element_ty(t)),
            None => (Ty::Unknown, Ty::Unknown),
        };
        if let Some(body) = node.child_by_field_name("body") {
            self.literal_value(body, fields, elements);
        }
    }

    /// Element type of slice, array and map types.
    fn element_ty(&self, ty: Node<'b>) -> Ty {
        let inner = match ty.kind() {
            "slice_type" | "array_type" | "implicit_length_array_type" => {
                ty.child_by_field_name("element")
            }
            "map_type" => ty.child_by_field_name("value"),
            _ => None,
        };
        match inner {
            Some(inner) if inner.kind() == "pointer_type" => nodes::named_children(inner)
                .into_iter()
                .next()
                .map_or(Ty::Unknown, |t| self.ty_of_type(t)),
            Some(inner) => self.ty_of_type(inner),
            None => Ty::Unknown,
        }
    }

    fn literal_value(&mut self, body: Node<'b>, fields: Ty, elements: Ty) {
        for element in nodes::named_children(body) {
            match element.kind() {
                "keyed_element" => {
                    let parts = nodes::named_children(element);
                    let (Some(key), Some(value)) = (parts.first(), parts.last()) else {
                        continue;
                    };
                    self.literal_key(*key, fields);
                    self.literal_element(*value, elements);
                }
                _ => self.literal_element(element, elements),
            }
        }
    }

    fn literal_element(&mut self, node: Node<'b>, ty: Ty) {
        let inner = unwrap_literal_element(node);
        if inner.kind() == "literal_value" {
            self.literal_value(inner, ty, Ty::Unknown);
        } else {
            self.walk(inner);
        }
    }

    fn literal_key(&mut self, node: Node<'b>, fields: Ty) {
        let key = unwrap_literal_element(node);
        if !matches!(key.kind(), "identifier" | "field_identifier") {
            if key.kind() == "literal_value" {
                self.literal_value(key, Ty::Unknown, Ty::Unknown);
            } else {
                self.walk(key);
            }
            return;
        }
        let name = self.text(key);
        match fields {
            Ty::Named(t) if self.has_fields(t) => {
                if let Some(id) = self.binder.find_member(t, name) {
                    self.emit(id, key, false, None);
                }
            }
            Ty::Unknown if self.local(name).is_none() && !self.is_package_name(name) => {
                let candidates: Vec<SymbolId> = self
                    .binder
                    .members_named(name)
                    .iter()
                    .copied()
                    .filter(|id| self.ws.symbol(*id).kind == SymbolKind::Field)
                    .collect();
                for id in candidates {
                    self.emit(id, key, true, None);
                }
            }
            _ => self.walk(key),
        }
    }

    fn has_fields(&self, ty: SymbolId) -> bool {
        let sym = self.ws.symbol(ty);
        !self.ws.package(sym.package).symbols.fields_of(&sym.name).is_empty()
    }

    fn is_package_name(&self, name: &str) -> bool {
        !self.file.external_test
            && self
                .ws
                .package(self.file.package)
                .symbols
                .lookup(name)
                .is_some()
    }

    fn free(&mut self, node: Node<'b>, type_position: bool) {
        let name = self.text(node);
        if self.local(name).is_some() || self.file.external_test {
            return;
        }
        let ws = self.ws;
        let table = &ws.package(self.file.package).symbols;
        let found = if type_position {
            table.types.get(name).copied()
        } else {
            table.lookup(name)
        };
        let found = found.or_else(|| self.binder.dot_imported(self.file.id, name, type_position));
        if let Some(id) = found {
            self.emit(id, node, false, None);
        }
    }

    /// Bind a type node written in this file.
    fn ty_of_type(&self, node: Node<'_>) -> Ty {
        match node.kind() {
            "type_identifier" | "qualified_type" | "generic_type" | "pointer_type"
            | "parenthesized_type" => {}
            _ => return Ty::External,
        }
        let Some(r) = TypeRef::from_node(node, self.src) else {
            return Ty::Unknown;
        };
        if r.qualifier.is_none() && self.local(&r.name).is_some() {
            return Ty::Unknown;
        }
        self.binder.type_ref_in(self.file.id, &r)
    }

    fn ty_of(&self, expr: Node<'_>) -> Ty {
        match expr.kind() {
            "identifier" => {
                let name = self.text(expr);
                if let Some(ty) = self.local(name) {
                    return ty;
                }
                if self.file.external_test {
                    return Ty::Unknown;
                }
                match self.ws.package(self.file.package).symbols.lookup(name) {
                    Some(id) => self.binder.value_ty(id),
                    None => Ty::Unknown,
                }
            }
            "parenthesized_expression" => nodes::named_children(expr)
                .into_iter()
                .next()
                .map_or(Ty::Unknown, |inner| self.ty_of(inner)),
            "unary_expression" => expr
                .child_by_field_name("operand")
                .map_or(Ty::Unknown, |inner| self.ty_of(inner)),
            "composite_literal" => expr
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |t| self.ty_of_type(t)),
            "call_expression" => self.call_result(expr, 0),
            "type_assertion_expression" | "type_conversion_expression" => expr
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |t| self.ty_of_type(t)),
            "selector_expression" => {
                let (Some(operand), Some(field)) = (
                    expr.child_by_field_name("operand"),
                    expr.child_by_field_name("field"),
                ) else {
                    return Ty::Unknown;
                };
                let name = self.text(field);
                if let Some(target) = self.qualified_package(operand) {
                    return match target {
                        Some(pkg) => self
                            .ws
                            .package(pkg)
                            .symbols
                            .lookup(name)
                            .map_or(Ty::Unknown, |id| self.binder.value_ty(id)),
                        None => Ty::External,
                    };
                }
                match self.ty_of(operand) {
                    Ty::Named(t) => match self.binder.find_member(t, name) {
                        Some(m) if self.ws.symbol(m).kind == SymbolKind::Field => {
                            self.binder.value_ty(m)
                        }
                        _ => Ty::Unknown,
                    },
                    other => other,
                }
            }
            "interpreted_string_literal" | "raw_string_literal" | "int_literal"
            | "float_literal" | "imaginary_literal" | "rune_literal" | "true" | "false"
            | "nil" | "func_literal" => Ty::External,
            _ => Ty::Unknown,
        }
    }

    /// `Some(Some(pkg))` for a workspace import name, `Some(None)` for an
    /// external one, `None` when `operand` is not an import name.
    fn qualified_package(&self, operand: Node<'_>) -> Option<Option<PackageId>> {
        if operand.kind() != "identifier" {
            return None;
        }
        let name = self.text(operand);
        if self.local(name).is_some() {
            return None;
        }
        let spec = self.ws.import_for_name(self.file.id, name)?;
        Some(self.ws.package_by_import_path(&spec.path))
    }

    fn call_result(&self, call: Node<'_>, idx: usize) -> Ty {
        let Some(function) = call.child_by_field_name("function") else {
            return Ty::Unknown;
        };
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                if self.local(name).is_some() {
                    return Ty::Unknown;
                }
                match name {
                    "new" | "make" if idx == 0 => {
                        return call
                            .child_by_field_name("arguments")
                            .and_then(|a| nodes::named_children(a).into_iter().next())
                            .map_or(Ty::Unknown, |t| self.ty_of_type(t));
                    }
                    "len" | "cap" | "append" | "copy" | "complex" | "real" | "imag" => {
                        return Ty::External
                    }
                    _ => {}
                }
                if self.file.external_test {
                    return Ty::Unknown;
                }
                match self.ws.package(self.file.package).symbols.lookup(name) {
                    Some(id) => self.callee_result(id, idx),
                    None => Ty::Unknown,
                }
            }
            "selector_expression" => {
                let (Some(operand), Some(field)) = (
                    function.child_by_field_name("operand"),
                    function.child_by_field_name("field"),
                ) else {
                    return Ty::Unknown;
                };
                let name = self.text(field);
                if let Some(target) = self.qualified_package(operand) {
                    return match target {
                        Some(pkg) => self
                            .ws
                            .package(pkg)
                            .symbols
                            .lookup(name)
                            .map_or(Ty::Unknown, |id| self.callee_result(id, idx)),
                        None => Ty::External,
                    };
                }
                match self.ty_of(operand) {
                    Ty::Named(t) => self
                        .binder
                        .find_member(t, name)
                        .map_or(Ty::Unknown, |m| self.callee_result(m, idx)),
                    other => other,
                }
            }
            _ => Ty::Unknown,
        }
    }

    fn callee_result(&self, callee: SymbolId, idx: usize) -> Ty {
        match self.ws.symbol(callee).kind {
            SymbolKind::Function | SymbolKind::Method => self.binder.result_ty(callee, idx),
            SymbolKind::Type | SymbolKind::Interface if idx == 0 => Ty::Named(callee),
            _ => Ty::Unknown,
        }
    }
}

fn unwrap_literal_element(node: Node<'_>) -> Node<'_> {
    if node.kind() == "literal_element" {
        if let Some(inner) = nodes::named_children(node).into_iter().next() {
            return inner;
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn names(ws: &Workspace, file: &str) -> Vec<(String, bool)> {
        let binder = Binder::new(ws);
        let id = ws.file_by_path(Path::new(file)).unwrap();
        bind_file(&binder, ws.file(id))
            .into_iter()
            .map(|o| (ws.symbol(o.symbol).qualified_name(), o.ambiguous))
            .collect()
    }

    #[test]
    fn locals_shadow_package_names() {
        let ws = Workspace::from_sources(
            "/ws",
            None,
            &[(
                "p/p.go",
                "package p\n\nvar count int\n\nfunc Inc() {\n\tcount++\n\tcount := 3\n\t_ = count\n}\n",
            )],
        )
        .unwrap();
        let found = names(&ws, "p/p.go");
        assert_eq!(found, vec![("count".to_string(), false)]);
    }

    #[test]
    fn members_bind_through_inferred_types() {
        let ws = Workspace::from_sources(
            "/ws",
            None,
            &[(
                "p/p.go",
                r#"package p

type A struct{ N int }

func (a *A) Close() error { return nil }

type B struct{}

func (b B) Close() error { return nil }

func NewA() *A { return &A{N: 1} }

func use(x interface{ Close() error }) {
	a := NewA()
	a.Close()
	var b B
	b.Close()
	x.Close()
}
"#,
            )],
        )
        .unwrap();
        let found = names(&ws, "p/p.go");
        let exact: Vec<_> = found.iter().filter(|(_, amb)| !amb).map(|(n, _)| n.as_str()).collect();
        assert!(exact.contains(&"A.Close"));
        assert!(exact.contains(&"B.Close"));
        assert!(exact.contains(&"A.N"));
        // `x` has an anonymous interface type: no workspace binding at all.
        assert_eq!(found.iter().filter(|(_, amb)| *amb).count(), 0);
    }

    #[test]
    fn unknown_receivers_fall_back_to_name() {
        let ws = Workspace::from_sources(
            "/ws",
            None,
            &[(
                "p/p.go",
                "package p\n\ntype A struct{}\n\nfunc (A) Run() {}\n\nfunc call(get func() A) {\n\tget().Run()\n}\n",
            )],
        )
        .unwrap();
        let found = names(&ws, "p/p.go");
        assert!(found.contains(&("A.Run".to_string(), true)));
    }

    #[test]
    fn qualified_references_record_qualifier() {
        let ws = Workspace::from_sources(
            "/ws",
            Some("m"),
            &[
                ("a/a.go", "package a\n\ntype T struct{}\n\nfunc Foo() T { return T{} }\n"),
                (
                    "b/b.go",
                    "package b\n\nimport x \"m/a\"\n\nvar V x.T = x.Foo()\n",
                ),
            ],
        )
        .unwrap();
        let binder = Binder::new(&ws);
        let id = ws.file_by_path(Path::new("b/b.go")).unwrap();
        let file = ws.file(id);
        let occ = bind_file(&binder, file);
        assert_eq!(occ.len(), 2);
        for o in &occ {
            let q = o.qualifier.clone().unwrap();
            assert_eq!(&file.source[q], "x");
        }
    }
}
