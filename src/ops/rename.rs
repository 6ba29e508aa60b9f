//! Renames: top-level symbols, methods (optionally across interface
//! implementations) and package clauses.

use crate::error::RefactorError;
use crate::ops::common::{bound_names, check_identifier};
use crate::ops::{Context, Operation, OperationKind, Scope};
use crate::plan::{Change, Issue, IssueKind, Plan};
use crate::resolve::Reference;
use crate::workspace::{is_exported, SymbolId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Rename a function, type, variable or constant and every reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSymbol {
    /// Owning package; optional for workspace scope.
    #[serde(default)]
    pub package: Option<String>,
    #[serde(rename = "symbol", alias = "name")]
    pub name: String,
    pub new_name: String,
    #[serde(default)]
    pub scope: Scope,
}

impl RenameSymbol {
    fn targets(&self, cx: &Context<'_>) -> Result<Vec<SymbolId>, RefactorError> {
        match (&self.package, self.scope) {
            (Some(pkg), _) => {
                let pkg = cx.package(pkg)?;
                Ok(vec![cx.resolver().resolve(pkg, &self.name)?])
            }
            (None, Scope::Workspace) => {
                let found = cx.resolver().resolve_everywhere(&self.name);
                if found.is_empty() {
                    let mut names: Vec<&str> = cx
                        .ws
                        .packages()
                        .iter()
                        .flat_map(|p| p.symbols.top_level_names())
                        .collect();
                    names.sort_unstable();
                    names.dedup();
                    return Err(RefactorError::not_found(&self.name, "workspace", names));
                }
                Ok(found)
            }
            (None, Scope::Package) => Err(RefactorError::invalid(
                "package scope requires a package",
            )),
        }
    }
}

impl Operation for RenameSymbol {
    fn kind(&self) -> OperationKind {
        OperationKind::RenameSymbol
    }

    fn describe(&self) -> String {
        format!("rename {} to {} ({} scope)", self.name, self.new_name, self.scope)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.new_name)?;
        let targets = self.targets(cx)?;
        if self.new_name == self.name {
            return Ok(());
        }
        for id in targets {
            let pkg = cx.ws.package(cx.ws.symbol(id).package);
            if pkg.symbols.lookup(&self.new_name).is_some() {
                return Err(RefactorError::conflict(
                    &self.new_name,
                    format!("package {}", pkg.import_path),
                ));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let mut plan = Plan::for_operation(self.clone().into());
        if self.new_name == self.name {
            return Ok(plan);
        }
        let targets = self.targets(cx)?;
        rename_references(cx, &mut plan, &targets, &self.name, &self.new_name);
        Ok(plan)
    }
}

/// Rename `Type.method`. For interfaces, `update_implementations` renames
/// the providing method of every implementing type too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameMethod {
    #[serde(default)]
    pub package: Option<String>,
    pub type_name: String,
    pub method: String,
    pub new_name: String,
    #[serde(default)]
    pub update_implementations: bool,
}

impl RenameMethod {
    fn resolve(&self, cx: &Context<'_>) -> Result<SymbolId, RefactorError> {
        match &self.package {
            Some(pkg) => {
                let pkg = cx.package(pkg)?;
                cx.resolver().resolve_method(pkg, &self.type_name, &self.method)
            }
            None => cx
                .resolver()
                .resolve_method_anywhere(&self.type_name, &self.method),
        }
    }

    /// The method plus, for interfaces with `update_implementations`, the
    /// implementing methods.
    fn targets(&self, cx: &Context<'_>) -> Result<Vec<SymbolId>, RefactorError> {
        let method = self.resolve(cx)?;
        let mut out = vec![method];
        let sym = cx.ws.symbol(method);
        if !(sym.in_interface && self.update_implementations) {
            return Ok(out);
        }
        let Some(iface) = cx.resolver().owner_type(method) else {
            return Ok(out);
        };
        for ty in cx.resolver().find_interface_implementations(iface) {
            let provided = cx
                .resolver()
                .method_set(ty)
                .into_iter()
                .find(|m| cx.ws.symbol(*m).name == self.method);
            if let Some(m) = provided {
                if !out.contains(&m) {
                    out.push(m);
                }
            }
        }
        Ok(out)
    }
}

impl Operation for RenameMethod {
    fn kind(&self) -> OperationKind {
        OperationKind::RenameMethod
    }

    fn describe(&self) -> String {
        format!(
            "rename method {}.{} to {}",
            self.type_name, self.method, self.new_name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.new_name)?;
        let targets = self.targets(cx)?;
        if self.new_name == self.method {
            return Ok(());
        }
        for id in targets {
            check_member_free(cx, id, &self.new_name)?;
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let mut plan = Plan::for_operation(self.clone().into());
        if self.new_name == self.method {
            return Ok(plan);
        }
        let targets = self.targets(cx)?;
        rename_references(cx, &mut plan, &targets, &self.method, &self.new_name);
        Ok(plan)
    }
}

/// Rename a method of an interface and of every implementing type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameInterfaceMethod {
    #[serde(default)]
    pub package: Option<String>,
    pub interface: String,
    pub method: String,
    pub new_name: String,
}

impl RenameInterfaceMethod {
    fn as_method(&self) -> RenameMethod {
        RenameMethod {
            package: self.package.clone(),
            type_name: self.interface.clone(),
            method: self.method.clone(),
            new_name: self.new_name.clone(),
            update_implementations: true,
        }
    }
}

impl Operation for RenameInterfaceMethod {
    fn kind(&self) -> OperationKind {
        OperationKind::RenameInterfaceMethod
    }

    fn describe(&self) -> String {
        format!(
            "rename interface method {}.{} to {} with implementations",
            self.interface, self.method, self.new_name
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let inner = self.as_method();
        let method = inner.resolve(cx)?;
        if !cx.ws.symbol(method).in_interface {
            return Err(RefactorError::invalid(format!(
                "{} is not an interface",
                self.interface
            )));
        }
        inner.validate(cx)
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let inner = self.as_method().execute(cx)?;
        let mut plan = Plan::for_operation(self.clone().into());
        plan.extend(inner.changes);
        plan.impact.merge(inner.impact);
        Ok(plan)
    }
}

/// The owner of method `id` declares no other method or field `name`.
fn check_member_free(cx: &Context<'_>, id: SymbolId, name: &str) -> Result<(), RefactorError> {
    let sym = cx.ws.symbol(id);
    let Some(owner) = sym.receiver.as_deref() else {
        return Ok(());
    };
    let table = &cx.ws.package(sym.package).symbols;
    let taken = table
        .methods_of(owner)
        .iter()
        .chain(table.fields_of(owner))
        .any(|m| cx.ws.symbol(*m).name == name);
    if taken {
        return Err(RefactorError::conflict(name, format!("type {owner}")));
    }
    Ok(())
}

/// One change per distinct occurrence of any target, plus the visibility
/// and ambiguity warnings the rename causes.
fn rename_references(
    cx: &Context<'_>,
    plan: &mut Plan,
    targets: &[SymbolId],
    old: &str,
    new: &str,
) {
    let ws = cx.ws;
    let hides = is_exported(old) && !is_exported(new);
    let mut seen = BTreeSet::new();
    let description = format!("rename {old} to {new}");

    for id in targets {
        let sym = ws.symbol(*id);
        plan.touch_package(ws.package(sym.package).import_path.clone());
        let refs: Vec<&Reference> = cx.resolver().find_references_indexed(*id, cx.index);
        debug!(symbol = %sym.qualified_name(), references = refs.len(), "renaming");
        for r in refs {
            if !seen.insert((r.file, r.offset)) {
                continue;
            }
            let file = ws.file(r.file);
            plan.push(Change::span(
                &file.path,
                &file.source,
                r.range(),
                new,
                &description,
            ));
            plan.touch_package(ws.package(r.package).import_path.clone());
            if r.ambiguous {
                plan.add_issue(
                    Issue::warning(
                        IssueKind::CompilationSuspect,
                        format!("'{}' bound by name only; receiver type unknown", r.name),
                    )
                    .at(&r.path, Some(r.line)),
                );
            }
            let foreign = r.package != sym.package || file.external_test;
            if hides && foreign && !r.is_definition {
                plan.add_issue(
                    Issue::warning(
                        IssueKind::VisibilityViolation,
                        format!("'{new}' is unexported and no longer accessible here"),
                    )
                    .at(&r.path, Some(r.line)),
                );
            }
        }
    }
}

/// Change a package's declared name and, with `update_imports`, the
/// qualifier of every unaliased importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePackage {
    pub package: String,
    pub new_name: String,
    #[serde(default = "default_true")]
    pub update_imports: bool,
}

fn default_true() -> bool {
    true
}

impl Operation for RenamePackage {
    fn kind(&self) -> OperationKind {
        OperationKind::RenamePackage
    }

    fn describe(&self) -> String {
        format!("rename package {} to {}", self.package, self.new_name)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        check_identifier(&self.new_name)?;
        let id = cx.package(&self.package)?;
        if self.update_imports {
            let clash = cx
                .ws
                .packages()
                .iter()
                .find(|p| p.id != id && p.name == self.new_name);
            if let Some(other) = clash {
                return Err(RefactorError::conflict(
                    &self.new_name,
                    format!("workspace (package {})", other.import_path),
                ));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let id = cx.package(&self.package)?;
        let pkg = ws.package(id);
        let old = pkg.name.clone();
        let mut plan = Plan::for_operation(self.clone().into());
        if old == self.new_name {
            return Ok(plan);
        }
        plan.touch_package(pkg.import_path.clone());

        for file_id in pkg.all_files() {
            let file = ws.file(file_id);
            let Some(range) = file.package_name_range() else {
                continue;
            };
            let name = if file.external_test {
                format!("{}_test", self.new_name)
            } else {
                self.new_name.clone()
            };
            plan.push(Change::span(
                &file.path,
                &file.source,
                range,
                name,
                "package clause",
            ));
        }

        if !self.update_imports {
            return Ok(plan);
        }

        for file in ws.files() {
            let Some(spec) = file.imports.find(&pkg.import_path) else {
                continue;
            };
            if spec.alias.is_some() {
                continue;
            }
            let mut rewritten = BTreeSet::new();
            for r in cx.index.in_file(file.id) {
                let Some(q) = &r.qualifier else {
                    continue;
                };
                if ws.symbol(r.symbol).package != id || &file.source[q.clone()] != old {
                    continue;
                }
                if rewritten.insert(q.start) {
                    plan.push(Change::span(
                        &file.path,
                        &file.source,
                        q.clone(),
                        &self.new_name,
                        "qualified references",
                    ));
                }
            }
            if rewritten.is_empty() {
                continue;
            }
            plan.touch_package(ws.package(file.package).import_path.clone());
            if bound_names(ws, file).contains(&self.new_name) {
                plan.add_issue(
                    Issue::warning(
                        IssueKind::NameConflict,
                        format!("'{}' is already bound in this file", self.new_name),
                    )
                    .at(&file.path, None),
                );
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};

    const A: &str = "package a\n\nfunc Foo() int { return 1 }\n";
    const B: &str = "package b\n\nimport \"example.com/m/a\"\n\nfunc Use() int { return a.Foo() }\n";

    #[test]
    fn rename_function_workspace_wide() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let op = RenameSymbol {
            package: None,
            name: "Foo".into(),
            new_name: "Bar".into(),
            scope: Scope::Workspace,
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(p.changes.len(), 2);
        assert!(p.changes.iter().all(|c| c.new_text == "Bar" && c.old_text == "Foo"));
        let out = applied(&ws, &p);
        assert_eq!(out["a/a.go"], "package a\n\nfunc Bar() int { return 1 }\n");
        assert!(out["b/b.go"].contains("return a.Bar()"));
    }

    #[test]
    fn same_name_is_empty() {
        let ws = workspace(&[("a/a.go", A)]);
        let op = RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: "Foo".into(),
            scope: Scope::Package,
        };
        assert!(plan(&ws, op).unwrap().changes.is_empty());
    }

    #[test]
    fn rejects_keywords_and_conflicts() {
        let ws = workspace(&[("a/a.go", "package a\n\nfunc Foo() {}\n\nfunc Bar() {}\n")]);
        let op = |new: &str| RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: new.into(),
            scope: Scope::Package,
        };
        let err = plan(&ws, op("func")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
        let err = plan(&ws, op("Bar")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::NameConflict);
        let err = plan(&ws, RenameSymbol { name: "Nope".into(), ..op("X") }).unwrap_err();
        assert_eq!(err.kind(), IssueKind::SymbolNotFound);
    }

    #[test]
    fn unexporting_warns_per_foreign_reference() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let op = RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: "foo".into(),
            scope: Scope::Package,
        };
        let p = plan(&ws, op).unwrap();
        let warnings: Vec<_> = p
            .issues()
            .iter()
            .filter(|i| i.kind == IssueKind::VisibilityViolation)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].file.as_deref(), Some(std::path::Path::new("b/b.go")));
    }

    #[test]
    fn rename_back_restores_source() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let forward = plan(
            &ws,
            RenameSymbol {
                package: Some("a".into()),
                name: "Foo".into(),
                new_name: "Bar".into(),
                scope: Scope::Package,
            },
        )
        .unwrap();
        let out = applied(&ws, &forward);
        let renamed = workspace(&[("a/a.go", out["a/a.go"].as_str()), ("b/b.go", out["b/b.go"].as_str())]);
        let back = plan(
            &renamed,
            RenameSymbol {
                package: Some("a".into()),
                name: "Bar".into(),
                new_name: "Foo".into(),
                scope: Scope::Package,
            },
        )
        .unwrap();
        let restored = applied(&renamed, &back);
        assert_eq!(restored["a/a.go"], A);
        assert_eq!(restored["b/b.go"], B);
    }

    const IO: &str = "package io\n\ntype Reader interface {\n\tRead(p []byte) (int, error)\n}\n\ntype F struct{}\n\nfunc (f *F) Read(p []byte) (int, error) { return 0, nil }\n";
    const USE: &str = "package io\n\nfunc Use(buf []byte) {\n\tf := &F{}\n\tf.Read(buf)\n}\n";

    #[test]
    fn interface_method_with_implementations() {
        let ws = workspace(&[("io/io.go", IO), ("io/use.go", USE)]);
        let op = RenameInterfaceMethod {
            package: Some("io".into()),
            interface: "Reader".into(),
            method: "Read".into(),
            new_name: "ReadBytes".into(),
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(p.changes.len(), 3);
        let out = applied(&ws, &p);
        assert!(out["io/io.go"].contains("\tReadBytes(p []byte) (int, error)"));
        assert!(out["io/io.go"].contains("func (f *F) ReadBytes("));
        assert!(out["io/use.go"].contains("f.ReadBytes(buf)"));
    }

    #[test]
    fn method_conflict_with_field() {
        let src = "package p\n\ntype T struct{ Name string }\n\nfunc (t T) Get() string { return t.Name }\n";
        let ws = workspace(&[("p/p.go", src)]);
        let op = RenameMethod {
            package: Some("p".into()),
            type_name: "T".into(),
            method: "Get".into(),
            new_name: "Name".into(),
            update_implementations: false,
        };
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::NameConflict);
    }

    #[test]
    fn rename_package_rewrites_clauses_and_qualifiers() {
        let test = "package a_test\n\nimport \"example.com/m/a\"\n\nvar _ = a.Foo\n";
        let aliased = "package c\n\nimport x \"example.com/m/a\"\n\nvar _ = x.Foo\n";
        let ws = workspace(&[
            ("a/a.go", A),
            ("a/a_test.go", test),
            ("b/b.go", B),
            ("c/c.go", aliased),
        ]);
        let op = RenamePackage {
            package: "a".into(),
            new_name: "alpha".into(),
            update_imports: true,
        };
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert!(out["a/a.go"].starts_with("package alpha\n"));
        assert!(out["a/a_test.go"].starts_with("package alpha_test\n"));
        assert!(out["a/a_test.go"].contains("var _ = alpha.Foo"));
        assert!(out["b/b.go"].contains("return alpha.Foo()"));
        assert!(!out.contains_key("c/c.go"));
    }

    #[test]
    fn rename_package_conflicts_with_sibling_name() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let op = RenamePackage {
            package: "a".into(),
            new_name: "b".into(),
            update_imports: true,
        };
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::NameConflict);
    }
}
