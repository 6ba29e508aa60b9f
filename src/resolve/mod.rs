//! Symbol Resolver: name lookup, reference discovery and structural
//! interface checks.

pub mod index;
pub mod walk;

pub use index::{Reference, ReferenceIndex};
pub use walk::{Binder, Ty};

use crate::error::RefactorError;
use crate::workspace::{PackageId, SymbolId, SymbolKind, Workspace};
use std::collections::BTreeSet;

const MAX_EMBED_DEPTH: usize = 3;

pub struct Resolver<'w> {
    ws: &'w Workspace,
    binder: Binder<'w>,
}

impl<'w> Resolver<'w> {
    pub fn new(ws: &'w Workspace) -> Self {
        Self {
            ws,
            binder: Binder::new(ws),
        }
    }

    pub fn workspace(&self) -> &'w Workspace {
        self.ws
    }

    pub fn binder(&self) -> &Binder<'w> {
        &self.binder
    }

    /// Package by import path, directory or unique name.
    pub fn package(&self, spec: &str) -> Result<PackageId, RefactorError> {
        self.ws.find_package(spec).ok_or_else(|| {
            RefactorError::not_found(
                spec,
                "workspace packages",
                self.ws.packages().iter().map(|p| p.import_path.clone()),
            )
        })
    }

    /// Look `name` up in functions, types, variables then constants.
    pub fn resolve(&self, pkg: PackageId, name: &str) -> Result<SymbolId, RefactorError> {
        let package = self.ws.package(pkg);
        package.symbols.lookup(name).ok_or_else(|| {
            RefactorError::not_found(
                name,
                format!("package {}", package.import_path),
                package.symbols.top_level_names(),
            )
        })
    }

    /// Every top-level symbol named `name`, across packages.
    pub fn resolve_everywhere(&self, name: &str) -> Vec<SymbolId> {
        self.ws
            .packages()
            .iter()
            .filter_map(|p| p.symbols.lookup(name))
            .collect()
    }

    /// Method (concrete or interface) `type_name.method` of `pkg`.
    pub fn resolve_method(
        &self,
        pkg: PackageId,
        type_name: &str,
        method: &str,
    ) -> Result<SymbolId, RefactorError> {
        let package = self.ws.package(pkg);
        let methods = package.symbols.methods_of(type_name);
        methods
            .iter()
            .copied()
            .find(|id| self.ws.symbol(*id).name == method)
            .ok_or_else(|| {
                RefactorError::not_found(
                    format!("{type_name}.{method}"),
                    format!("package {}", package.import_path),
                    methods
                        .iter()
                        .map(|id| self.ws.symbol(*id).qualified_name()),
                )
            })
    }

    /// Resolve `type_name.method` without a package: production files of
    /// every package are searched and the match must be unique.
    pub fn resolve_method_anywhere(
        &self,
        type_name: &str,
        method: &str,
    ) -> Result<SymbolId, RefactorError> {
        let matches: Vec<SymbolId> = self
            .ws
            .packages()
            .iter()
            .filter_map(|p| self.resolve_method(p.id, type_name, method).ok())
            .collect();
        match matches.as_slice() {
            [single] => Ok(*single),
            [] => Err(RefactorError::not_found(
                format!("{type_name}.{method}"),
                "workspace",
                Vec::<String>::new(),
            )),
            many => Err(RefactorError::invalid(format!(
                "{type_name}.{method} is declared in {} packages; pass --package",
                many.len()
            ))),
        }
    }

    /// Struct field `type_name.field` of `pkg`.
    pub fn resolve_field(
        &self,
        pkg: PackageId,
        type_name: &str,
        field: &str,
    ) -> Result<SymbolId, RefactorError> {
        let package = self.ws.package(pkg);
        package
            .symbols
            .fields_of(type_name)
            .iter()
            .copied()
            .find(|id| self.ws.symbol(*id).name == field)
            .ok_or_else(|| {
                RefactorError::not_found(
                    format!("{type_name}.{field}"),
                    format!("package {}", package.import_path),
                    Vec::<String>::new(),
                )
            })
    }

    /// Full scan: bind every file and keep the occurrences of `symbol`.
    pub fn find_references(&self, symbol: SymbolId) -> Vec<Reference> {
        self.build_reference_index()
            .references(symbol)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn find_references_indexed<'i>(
        &self,
        symbol: SymbolId,
        index: &'i ReferenceIndex,
    ) -> Vec<&'i Reference> {
        index.references(symbol)
    }

    pub fn find_references_indexed_filtered<'i>(
        &self,
        symbol: SymbolId,
        index: &'i ReferenceIndex,
        packages: &[PackageId],
    ) -> Vec<&'i Reference> {
        index.references_in(symbol, packages)
    }

    pub fn build_reference_index(&self) -> ReferenceIndex {
        ReferenceIndex::build(self.ws)
    }

    /// Methods callable on values of a concrete type: its own methods plus
    /// those promoted through embedded fields. Shadowed names are dropped.
    pub fn method_set(&self, ty: SymbolId) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut names = BTreeSet::new();
        self.collect_methods(ty, 0, &mut names, &mut out, &mut vec![ty]);
        out
    }

    fn collect_methods(
        &self,
        ty: SymbolId,
        depth: usize,
        names: &mut BTreeSet<String>,
        out: &mut Vec<SymbolId>,
        visited: &mut Vec<SymbolId>,
    ) {
        let sym = self.ws.symbol(ty);
        let table = &self.ws.package(sym.package).symbols;
        for id in table.methods_of(&sym.name) {
            let m = self.ws.symbol(*id);
            if names.insert(m.name.clone()) {
                out.push(*id);
            }
        }
        if depth >= MAX_EMBED_DEPTH {
            return;
        }
        for embed in &sym.embeds {
            if let Ty::Named(inner) = self.binder.type_ref_in(sym.file, embed) {
                if !visited.contains(&inner) {
                    visited.push(inner);
                    self.collect_methods(inner, depth + 1, names, out, visited);
                }
            }
        }
    }

    /// Methods an interface requires, including embedded workspace
    /// interfaces. Embedded interfaces declared outside the workspace are
    /// not expanded.
    pub fn interface_method_set(&self, iface: SymbolId) -> Vec<SymbolId> {
        self.method_set(iface)
    }

    /// Every method of `iface` has a same-named method with the same
    /// parameter and result spellings on `ty`.
    pub fn check_interface_compliance(&self, ty: SymbolId, iface: SymbolId) -> bool {
        if self.ws.symbol(iface).kind != SymbolKind::Interface || ty == iface {
            return false;
        }
        let available = self.method_set(ty);
        self.interface_method_set(iface).iter().all(|required| {
            let required = self.ws.symbol(*required);
            available.iter().any(|m| {
                let m = self.ws.symbol(*m);
                m.name == required.name
                    && match (&m.signature, &required.signature) {
                        (Some(a), Some(b)) => a.same_shape(b),
                        _ => false,
                    }
            })
        })
    }

    /// Concrete types whose method set covers `iface`.
    pub fn find_interface_implementations(&self, iface: SymbolId) -> Vec<SymbolId> {
        self.ws
            .symbol_ids()
            .filter(|id| self.ws.symbol(*id).kind == SymbolKind::Type)
            .filter(|id| self.check_interface_compliance(*id, iface))
            .collect()
    }

    /// Workspace interfaces `ty` satisfies.
    pub fn interfaces_implemented_by(&self, ty: SymbolId) -> Vec<SymbolId> {
        self.ws
            .symbol_ids()
            .filter(|id| self.ws.symbol(*id).kind == SymbolKind::Interface)
            .filter(|id| !self.interface_method_set(*id).is_empty())
            .filter(|id| self.check_interface_compliance(ty, *id))
            .collect()
    }

    /// Type symbol that owns a method or field.
    pub fn owner_type(&self, member: SymbolId) -> Option<SymbolId> {
        let sym = self.ws.symbol(member);
        let owner = sym.receiver.as_deref()?;
        self.ws.package(sym.package).symbols.types.get(owner).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IO: &str = r#"package io

type Reader interface {
	Read(p []byte) (int, error)
}

type Closer interface {
	Close() error
}

type ReadCloser interface {
	Reader
	Closer
}

type F struct{}

func (f *F) Read(p []byte) (int, error) { return 0, nil }

func (f *F) Close() error { return nil }

type G struct{}

func (g G) Read(p []byte) int { return 0 }

type Wrapped struct {
	*F
}
"#;

    fn ws() -> Workspace {
        Workspace::from_sources("/ws", None, &[("io/io.go", IO)]).unwrap()
    }

    #[test]
    fn resolve_reports_candidates() {
        let ws = ws();
        let r = Resolver::new(&ws);
        let pkg = r.package("io").unwrap();
        assert!(r.resolve(pkg, "Reader").is_ok());
        let err = r.resolve(pkg, "Writer").unwrap_err();
        assert!(err.to_string().contains("Reader"));
    }

    #[test]
    fn structural_compliance() {
        let ws = ws();
        let r = Resolver::new(&ws);
        let pkg = r.package("io").unwrap();
        let reader = r.resolve(pkg, "Reader").unwrap();
        let rc = r.resolve(pkg, "ReadCloser").unwrap();
        let f = r.resolve(pkg, "F").unwrap();
        let g = r.resolve(pkg, "G").unwrap();
        let wrapped = r.resolve(pkg, "Wrapped").unwrap();

        assert!(r.check_interface_compliance(f, reader));
        assert!(!r.check_interface_compliance(g, reader));
        assert!(r.check_interface_compliance(f, rc));
        assert!(r.check_interface_compliance(wrapped, rc));

        let impls = r.find_interface_implementations(reader);
        assert_eq!(impls, vec![f, wrapped]);
        assert_eq!(r.interfaces_implemented_by(f).len(), 3);
    }

    #[test]
    fn method_lookup_anywhere() {
        let ws = ws();
        let r = Resolver::new(&ws);
        let read = r.resolve_method_anywhere("Reader", "Read").unwrap();
        assert!(ws.symbol(read).in_interface);
        assert!(r.resolve_method_anywhere("Reader", "Write").is_err());
    }
}
