//! Symbol tables: every package-level declaration of a package, plus methods,
//! struct fields and interface methods keyed by their owning type.

use crate::ts::nodes::{self, normalize_type};
use crate::workspace::{FileId, PackageId};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use tree_sitter::Node;

/// Index of a [`Symbol`] in the workspace arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Interface,
    Field,
    Variable,
    Constant,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
            SymbolKind::Interface => "interface",
            SymbolKind::Field => "struct-field",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
        }
    }

    /// Kinds stored in the package-level name maps.
    pub fn is_top_level(self) -> bool {
        !matches!(self, SymbolKind::Method | SymbolKind::Field)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named type as spelled in a file: `T`, `pkg.T` (pointer and generic
/// decorations stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Import local name for qualified types.
    pub qualifier: Option<String>,
    pub name: String,
}

impl TypeRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Read a type node, looking through `*T`, `T[...]` and `(T)`.
    pub fn from_node(node: Node<'_>, source: &str) -> Option<Self> {
        match node.kind() {
            "type_identifier" | "identifier" => Some(Self::local(nodes::text(node, source))),
            "qualified_type" => {
                let package = node.child_by_field_name("package")?;
                let name = node.child_by_field_name("name")?;
                Some(Self {
                    qualifier: Some(nodes::text(package, source).to_string()),
                    name: nodes::text(name, source).to_string(),
                })
            }
            "generic_type" => Self::from_node(node.child_by_field_name("type")?, source),
            "pointer_type" | "parenthesized_type" => nodes::named_children(node)
                .into_iter()
                .find_map(|c| Self::from_node(c, source)),
            "type_elem" => nodes::named_children(node)
                .into_iter()
                .find_map(|c| Self::from_node(c, source)),
            _ => None,
        }
    }

    /// Read a type spelling such as `*pkg.T` or `T[int]`. Composite types
    /// (slices, maps, channels, functions) yield `None`.
    pub fn parse(spelling: &str) -> Option<Self> {
        let s = spelling.trim().trim_start_matches('*').trim();
        let s = s.split('[').next()?.trim();
        let ident = |p: &str| {
            !p.is_empty()
                && p.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !p.starts_with(|c: char| c.is_ascii_digit())
        };
        match s.split_once('.') {
            Some((q, n)) if ident(q) && ident(n) => Some(Self {
                qualifier: Some(q.to_string()),
                name: n.to_string(),
            }),
            None if ident(s) && !matches!(s, "map" | "chan" | "func" | "struct" | "interface") => {
                Some(Self::local(s))
            }
            _ => None,
        }
    }
}

/// Best-effort static type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeHint {
    #[default]
    Unknown,
    /// Value of a named type (or a pointer to it).
    Named(TypeRef),
    /// Result of calling the function named by the ref.
    CallResult(TypeRef),
}

impl TypeHint {
    /// Derive a hint from a value expression.
    pub fn of_value(node: Node<'_>, source: &str) -> TypeHint {
        match node.kind() {
            "composite_literal" => node
                .child_by_field_name("type")
                .and_then(|t| TypeRef::from_node(t, source))
                .map_or(TypeHint::Unknown, TypeHint::Named),
            "unary_expression" | "parenthesized_expression" => node
                .child_by_field_name("operand")
                .or_else(|| nodes::named_children(node).into_iter().next())
                .map_or(TypeHint::Unknown, |inner| TypeHint::of_value(inner, source)),
            "call_expression" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return TypeHint::Unknown;
                };
                match function.kind() {
                    "identifier" if nodes::text(function, source) == "new" => node
                        .child_by_field_name("arguments")
                        .and_then(|args| nodes::named_children(args).into_iter().next())
                        .and_then(|t| TypeRef::from_node(t, source))
                        .map_or(TypeHint::Unknown, TypeHint::Named),
                    "identifier" => {
                        TypeHint::CallResult(TypeRef::local(nodes::text(function, source)))
                    }
                    "selector_expression" => {
                        let operand = function.child_by_field_name("operand");
                        let field = function.child_by_field_name("field");
                        match (operand, field) {
                            (Some(op), Some(field)) if op.kind() == "identifier" => {
                                TypeHint::CallResult(TypeRef {
                                    qualifier: Some(nodes::text(op, source).to_string()),
                                    name: nodes::text(field, source).to_string(),
                                })
                            }
                            _ => TypeHint::Unknown,
                        }
                    }
                    _ => TypeHint::Unknown,
                }
            }
            _ => TypeHint::Unknown,
        }
    }
}

/// One parameter or result entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    /// Type spelling as written (`...T` for variadic parameters).
    pub ty: String,
}

/// Function or method signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    /// Span of the parameter list including parentheses.
    pub params_range: Range<usize>,
    /// Span of the result (a bare type or a parenthesized list).
    pub results_range: Option<Range<usize>>,
}

impl Signature {
    pub fn from_node(node: Node<'_>, source: &str) -> Option<Self> {
        let params = node.child_by_field_name("parameters")?;
        let result = node.child_by_field_name("result");
        Some(Self {
            params: read_params(params, source),
            results: result.map(|r| read_result(r, source)).unwrap_or_default(),
            params_range: params.byte_range(),
            results_range: result.map(|r| r.byte_range()),
        })
    }

    pub fn param_types(&self) -> Vec<String> {
        self.params.iter().map(|p| normalize_type(&p.ty)).collect()
    }

    pub fn result_types(&self) -> Vec<String> {
        self.results.iter().map(|p| normalize_type(&p.ty)).collect()
    }

    /// Type-only equality used by interface satisfaction.
    pub fn same_shape(&self, other: &Signature) -> bool {
        self.param_types() == other.param_types() && self.result_types() == other.result_types()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.ty.starts_with("..."))
    }

    /// Render a parameter or result list back to source form.
    pub fn render_list(list: &[Param]) -> String {
        let parts: Vec<String> = list
            .iter()
            .map(|p| match &p.name {
                Some(name) => format!("{name} {}", p.ty),
                None => p.ty.clone(),
            })
            .collect();
        parts.join(", ")
    }

    /// Read a comma-separated spelling such as `a, b int` into one entry
    /// per name, the way declarations are read. `None` when the text is not
    /// a parameter list.
    pub fn parse_list(spelling: &str) -> Option<Vec<Param>> {
        if spelling.trim().is_empty() {
            return Some(Vec::new());
        }
        let source = format!("package p\n\nfunc f({spelling}) {{}}\n");
        let tree = crate::pool::with_parser(|parser| parser.parse(&source))
            .ok()?
            .ok()?;
        let root = tree.root_node();
        if root.has_error() {
            return None;
        }
        let list = nodes::named_children(root)
            .into_iter()
            .find(|n| n.kind() == "function_declaration")?
            .child_by_field_name("parameters")?;
        Some(read_params(list, &source))
    }

    /// Name and type equality, ignoring spacing inside type spellings.
    pub fn same_list(a: &[Param], b: &[Param]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|(x, y)| x.name == y.name && normalize_type(&x.ty) == normalize_type(&y.ty))
    }

    /// Result clause as it would follow the parameter list (with a leading
    /// space), empty when there are no results.
    pub fn render_results(list: &[Param]) -> String {
        match list {
            [] => String::new(),
            [single] if single.name.is_none() => format!(" {}", single.ty),
            _ => format!(" ({})", Self::render_list(list)),
        }
    }
}

fn read_params(list: Node<'_>, source: &str) -> Vec<Param> {
    let mut out = Vec::new();
    for decl in nodes::named_children(list) {
        let Some(ty_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let mut ty = nodes::text(ty_node, source).to_string();
        if decl.kind() == "variadic_parameter_declaration" {
            ty = format!("...{ty}");
        }
        let names = nodes::field_children(decl, "name");
        if names.is_empty() {
            out.push(Param { name: None, ty });
        } else {
            for name in names {
                out.push(Param {
                    name: Some(nodes::text(name, source).to_string()),
                    ty: ty.clone(),
                });
            }
        }
    }
    out
}

fn read_result(result: Node<'_>, source: &str) -> Vec<Param> {
    if result.kind() == "parameter_list" {
        read_params(result, source)
    } else {
        vec![Param {
            name: None,
            ty: nodes::text(result, source).to_string(),
        }]
    }
}

/// A named declaration.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub package: PackageId,
    pub file: FileId,
    /// Offset of the declaring identifier.
    pub offset: usize,
    /// Whole declaration: function/method declaration, type/var/const spec,
    /// field declaration or interface method element.
    pub decl_range: Range<usize>,
    /// Methods: receiver base type. Fields and interface methods: owning type.
    pub receiver: Option<String>,
    pub pointer_receiver: bool,
    pub in_interface: bool,
    pub signature: Option<Signature>,
    /// Declared or inferred type of variables, constants and fields.
    pub value_type: TypeHint,
    /// Embedded types of a struct or interface type.
    pub embeds: Vec<TypeRef>,
    /// Embedded struct field.
    pub embedded: bool,
}

impl Symbol {
    pub fn exported(&self) -> bool {
        is_exported(&self.name)
    }

    pub fn name_range(&self) -> Range<usize> {
        self.offset..self.offset + self.name.len()
    }

    /// `Type.method` for members, bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match (&self.receiver, self.kind) {
            (Some(recv), SymbolKind::Method | SymbolKind::Field) => format!("{recv}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// First rune uppercase means exported.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Per-package name maps.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub functions: BTreeMap<String, SymbolId>,
    pub types: BTreeMap<String, SymbolId>,
    pub variables: BTreeMap<String, SymbolId>,
    pub constants: BTreeMap<String, SymbolId>,
    /// Receiver base type -> methods in source order (interface methods
    /// are keyed by their interface).
    pub methods: BTreeMap<String, Vec<SymbolId>>,
    /// Struct type -> fields in source order.
    pub fields: BTreeMap<String, Vec<SymbolId>>,
}

impl SymbolTable {
    /// Search functions, types, variables then constants.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.functions
            .get(name)
            .or_else(|| self.types.get(name))
            .or_else(|| self.variables.get(name))
            .or_else(|| self.constants.get(name))
            .copied()
    }

    pub fn methods_of(&self, type_name: &str) -> &[SymbolId] {
        self.methods.get(type_name).map_or(&[], Vec::as_slice)
    }

    pub fn fields_of(&self, type_name: &str) -> &[SymbolId] {
        self.fields.get(type_name).map_or(&[], Vec::as_slice)
    }

    /// Every top-level name, sorted.
    pub fn top_level_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .chain(self.types.keys())
            .chain(self.variables.keys())
            .chain(self.constants.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn all_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.functions
            .values()
            .chain(self.types.values())
            .chain(self.variables.values())
            .chain(self.constants.values())
            .copied()
            .chain(self.methods.values().flatten().copied())
            .chain(self.fields.values().flatten().copied())
    }
}

/// Collect every declaration of one file.
pub fn collect_symbols(
    package: PackageId,
    file: FileId,
    root: Node<'_>,
    source: &str,
) -> Vec<Symbol> {
    let mut out = Vec::new();
    let base = |name: Node<'_>, kind: SymbolKind, decl: Node<'_>| Symbol {
        name: nodes::text(name, source).to_string(),
        kind,
        package,
        file,
        offset: name.start_byte(),
        decl_range: decl.byte_range(),
        receiver: None,
        pointer_receiver: false,
        in_interface: false,
        signature: None,
        value_type: TypeHint::Unknown,
        embeds: Vec::new(),
        embedded: false,
    };

    for decl in nodes::named_children(root) {
        match decl.kind() {
            "function_declaration" => {
                let Some(name) = decl.child_by_field_name("name") else {
                    continue;
                };
                let mut sym = base(name, SymbolKind::Function, decl);
                sym.signature = Signature::from_node(decl, source);
                sym.value_type = first_result(decl, source);
                out.push(sym);
            }
            "method_declaration" => {
                let Some(name) = decl.child_by_field_name("name") else {
                    continue;
                };
                let Some((recv, pointer)) = receiver_type(decl, source) else {
                    continue;
                };
                let mut sym = base(name, SymbolKind::Method, decl);
                sym.receiver = Some(recv);
                sym.pointer_receiver = pointer;
                sym.signature = Signature::from_node(decl, source);
                sym.value_type = first_result(decl, source);
                out.push(sym);
            }
            "type_declaration" => {
                let specs = nodes::specs(decl, "type_spec")
                    .into_iter()
                    .chain(nodes::specs(decl, "type_alias"));
                for spec in specs {
                    let (Some(name), Some(ty)) = (
                        spec.child_by_field_name("name"),
                        spec.child_by_field_name("type"),
                    ) else {
                        continue;
                    };
                    let type_name = nodes::text(name, source).to_string();
                    let kind = if ty.kind() == "interface_type" {
                        SymbolKind::Interface
                    } else {
                        SymbolKind::Type
                    };
                    let mut sym = base(name, kind, spec);
                    match ty.kind() {
                        "struct_type" => {
                            let fields = struct_fields(ty, source, &type_name, &base);
                            sym.embeds = fields
                                .iter()
                                .filter(|f| f.embedded)
                                .filter_map(|f| match &f.value_type {
                                    TypeHint::Named(r) => Some(r.clone()),
                                    _ => None,
                                })
                                .collect();
                            out.push(sym);
                            out.extend(fields);
                        }
                        "interface_type" => {
                            let (methods, embeds) =
                                interface_members(ty, source, &type_name, &base);
                            sym.embeds = embeds;
                            out.push(sym);
                            out.extend(methods);
                        }
                        _ => {
                            sym.value_type = TypeRef::from_node(ty, source)
                                .map_or(TypeHint::Unknown, TypeHint::Named);
                            out.push(sym);
                        }
                    }
                }
            }
            "var_declaration" | "const_declaration" => {
                let (spec_kind, kind) = if decl.kind() == "var_declaration" {
                    ("var_spec", SymbolKind::Variable)
                } else {
                    ("const_spec", SymbolKind::Constant)
                };
                for spec in nodes::specs(decl, spec_kind) {
                    let declared = spec
                        .child_by_field_name("type")
                        .and_then(|t| TypeRef::from_node(t, source));
                    let values: Vec<Node<'_>> = spec
                        .child_by_field_name("value")
                        .map(nodes::named_children)
                        .unwrap_or_default();
                    for (idx, name) in nodes::field_children(spec, "name").into_iter().enumerate() {
                        if nodes::text(name, source) == "_" {
                            continue;
                        }
                        let mut sym = base(name, kind, spec);
                        sym.value_type = match &declared {
                            Some(r) => TypeHint::Named(r.clone()),
                            None => values
                                .get(idx)
                                .map_or(TypeHint::Unknown, |v| TypeHint::of_value(*v, source)),
                        };
                        out.push(sym);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Named type of the first result of a function-like node.
fn first_result(node: Node<'_>, source: &str) -> TypeHint {
    let Some(result) = node.child_by_field_name("result") else {
        return TypeHint::Unknown;
    };
    let ty = if result.kind() == "parameter_list" {
        nodes::named_children(result)
            .into_iter()
            .next()
            .and_then(|p| p.child_by_field_name("type"))
    } else {
        Some(result)
    };
    ty.and_then(|t| TypeRef::from_node(t, source))
        .map_or(TypeHint::Unknown, TypeHint::Named)
}

/// Receiver base type name and whether the receiver is a pointer.
pub fn receiver_type(method: Node<'_>, source: &str) -> Option<(String, bool)> {
    let receiver = method.child_by_field_name("receiver")?;
    let param = nodes::named_children(receiver).into_iter().next()?;
    let ty = param.child_by_field_name("type")?;
    let pointer = ty.kind() == "pointer_type";
    let r = TypeRef::from_node(ty, source)?;
    Some((r.name, pointer))
}

fn struct_fields<'t>(
    ty: Node<'t>,
    source: &str,
    owner: &str,
    base: &dyn Fn(Node<'t>, SymbolKind, Node<'t>) -> Symbol,
) -> Vec<Symbol> {
    let mut out = Vec::new();
    for list in nodes::named_children(ty) {
        if list.kind() != "field_declaration_list" {
            continue;
        }
        for field in nodes::specs(list, "field_declaration") {
            let Some(field_ty) = field.child_by_field_name("type") else {
                continue;
            };
            let type_ref = TypeRef::from_node(field_ty, source);
            let names = nodes::field_children(field, "name");
            if names.is_empty() {
                // Embedded field: the type name doubles as the field name.
                let Some(ident) = embedded_ident(field_ty) else {
                    continue;
                };
                let mut sym = base(ident, SymbolKind::Field, field);
                sym.receiver = Some(owner.to_string());
                sym.embedded = true;
                sym.value_type = type_ref.map_or(TypeHint::Unknown, TypeHint::Named);
                out.push(sym);
                continue;
            }
            for name in names {
                let mut sym = base(name, SymbolKind::Field, field);
                sym.receiver = Some(owner.to_string());
                sym.value_type = type_ref
                    .clone()
                    .map_or(TypeHint::Unknown, TypeHint::Named);
                out.push(sym);
            }
        }
    }
    out
}

fn embedded_ident(ty: Node<'_>) -> Option<Node<'_>> {
    match ty.kind() {
        "type_identifier" => Some(ty),
        "qualified_type" => ty.child_by_field_name("name"),
        "generic_type" => embedded_ident(ty.child_by_field_name("type")?),
        "pointer_type" => nodes::named_children(ty).into_iter().find_map(embedded_ident),
        _ => None,
    }
}

fn interface_members<'t>(
    ty: Node<'t>,
    source: &str,
    owner: &str,
    base: &dyn Fn(Node<'t>, SymbolKind, Node<'t>) -> Symbol,
) -> (Vec<Symbol>, Vec<TypeRef>) {
    let mut methods = Vec::new();
    let mut embeds = Vec::new();
    for member in nodes::named_children(ty) {
        match member.kind() {
            "method_elem" | "method_spec" => {
                let Some(name) = member.child_by_field_name("name") else {
                    continue;
                };
                let mut sym = base(name, SymbolKind::Method, member);
                sym.receiver = Some(owner.to_string());
                sym.in_interface = true;
                sym.signature = Signature::from_node(member, source);
                sym.value_type = first_result(member, source);
                methods.push(sym);
            }
            "type_elem" | "type_identifier" | "qualified_type" | "constraint_elem" => {
                embeds.extend(TypeRef::from_node(member, source));
            }
            _ => {}
        }
    }
    (methods, embeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::GoParser;

    fn symbols(source: &str) -> Vec<Symbol> {
        let tree = GoParser::new().unwrap().parse(source).unwrap();
        collect_symbols(PackageId(0), FileId(0), tree.root_node(), source)
    }

    fn find<'a>(syms: &'a [Symbol], name: &str) -> &'a Symbol {
        syms.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn collects_every_kind() {
        let source = r#"package shapes

const Pi = 3.14

var (
	Default = &Circle{}
	count   int
)

type Shape interface {
	Area() float64
	fmt.Stringer
}

type Circle struct {
	Base
	R, D float64
}

func New(r float64) *Circle { return &Circle{R: r} }

func (c *Circle) Area() float64 { return Pi * c.R * c.R }
"#;
        let syms = symbols(source);
        assert_eq!(find(&syms, "Pi").kind, SymbolKind::Constant);
        assert_eq!(find(&syms, "count").kind, SymbolKind::Variable);
        assert_eq!(
            find(&syms, "Default").value_type,
            TypeHint::Named(TypeRef::local("Circle"))
        );
        assert_eq!(find(&syms, "Shape").kind, SymbolKind::Interface);
        assert_eq!(find(&syms, "Shape").embeds.len(), 1);
        assert_eq!(find(&syms, "Circle").kind, SymbolKind::Type);
        assert_eq!(find(&syms, "New").kind, SymbolKind::Function);

        let fields: Vec<_> = syms
            .iter()
            .filter(|s| s.kind == SymbolKind::Field)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(fields, ["Base", "R", "D"]);
        assert!(find(&syms, "Base").embedded);

        let area: Vec<_> = syms.iter().filter(|s| s.name == "Area").collect();
        assert_eq!(area.len(), 2);
        assert!(area.iter().any(|s| s.in_interface && s.receiver.as_deref() == Some("Shape")));
        assert!(area
            .iter()
            .any(|s| !s.in_interface && s.pointer_receiver && s.receiver.as_deref() == Some("Circle")));
    }

    #[test]
    fn signatures_expand_grouped_names() {
        let source = "package p\n\nfunc Copy(dst, src []byte, opts ...Option) (n int, err error) { return }\n";
        let syms = symbols(source);
        let sig = find(&syms, "Copy").signature.clone().unwrap();
        assert_eq!(sig.param_types(), ["[]byte", "[]byte", "...Option"]);
        assert_eq!(sig.result_types(), ["int", "error"]);
        assert!(sig.is_variadic());
        assert_eq!(&source[sig.params_range.clone()], "(dst, src []byte, opts ...Option)");
    }

    #[test]
    fn render_results() {
        let single = vec![Param { name: None, ty: "error".into() }];
        assert_eq!(Signature::render_results(&single), " error");
        let pair = vec![
            Param { name: None, ty: "int".into() },
            Param { name: None, ty: "error".into() },
        ];
        assert_eq!(Signature::render_results(&pair), " (int, error)");
        assert_eq!(Signature::render_results(&[]), "");
    }

    #[test]
    fn grouped_and_split_spellings_agree() {
        let grouped = Signature::parse_list("a, b int").unwrap();
        let split = Signature::parse_list("a int, b int").unwrap();
        assert_eq!(grouped.len(), 2);
        assert!(Signature::same_list(&grouped, &split));
        assert!(!Signature::same_list(
            &grouped,
            &Signature::parse_list("a int, c int").unwrap()
        ));
        assert_eq!(Signature::parse_list("").unwrap(), Vec::new());
        assert_eq!(Signature::parse_list("a int,, b").as_deref(), None);
    }

    #[test]
    fn type_spellings() {
        assert_eq!(TypeRef::parse("*Circle"), Some(TypeRef::local("Circle")));
        assert_eq!(
            TypeRef::parse("io.Reader"),
            Some(TypeRef {
                qualifier: Some("io".into()),
                name: "Reader".into()
            })
        );
        assert_eq!(TypeRef::parse("List[int]"), Some(TypeRef::local("List")));
        assert_eq!(TypeRef::parse("[]byte"), None);
        assert_eq!(TypeRef::parse("map[string]int"), None);
    }

    #[test]
    fn exported_by_first_rune() {
        assert!(is_exported("Foo"));
        assert!(!is_exported("foo"));
        assert!(!is_exported("_Foo"));
    }
}
