//! Moving code between packages: one top-level symbol, a whole package, or
//! a directory tree of packages.

use crate::error::RefactorError;
use crate::ops::common::{
    check_identifier, decl_span, import_block, prune_imports, tidy_removals, within, DeclSpan,
    ImportEditor,
};
use crate::ops::rename::RenamePackage;
use crate::ops::transplant::Transplant;
use crate::ops::{AnyOperation, Context, Operation, OperationKind};
use crate::plan::{BatchComposer, Change, ImportEdge, Plan};
use crate::workspace::{
    default_package_name, FileId, PackageId, SymbolId, SymbolKind, Workspace,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Relocate one top-level declaration (and, for types, their methods).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSymbol {
    pub symbol: String,
    pub from_package: String,
    pub to_package: String,
    #[serde(default)]
    pub create_target: bool,
}

/// Destination of a move, existing or about to be created.
struct Target {
    id: Option<PackageId>,
    name: String,
    import_path: String,
    /// File receiving the declarations.
    path: PathBuf,
    file: Option<FileId>,
}

impl Target {
    /// Handle used in graph checks; a package that does not exist yet gets
    /// the next free id.
    fn node(&self, ws: &Workspace) -> PackageId {
        self.id
            .unwrap_or(PackageId(ws.packages().len() as u32))
    }
}

/// Everything validate and execute both need.
struct Analysis {
    source: PackageId,
    symbol: SymbolId,
    target: Target,
    /// Declarations leaving the source package, per file.
    spans: BTreeMap<FileId, Vec<DeclSpan>>,
}

impl Analysis {
    fn removed(&self, file: FileId) -> Vec<Range<usize>> {
        self.spans
            .get(&file)
            .map(|spans| spans.iter().map(|s| s.removal.clone()).collect())
            .unwrap_or_default()
    }
}

fn normalize_dir(spec: &str) -> PathBuf {
    PathBuf::from(spec.trim_start_matches("./").trim_end_matches('/'))
}

impl MoveSymbol {
    fn target(&self, cx: &Context<'_>) -> Result<Target, RefactorError> {
        let ws = cx.ws;
        if let Some(id) = ws.find_package(&self.to_package) {
            let pkg = ws.package(id);
            let file = pkg
                .files
                .get(&format!("{}.go", pkg.name))
                .or_else(|| pkg.files.values().next())
                .copied()
                .ok_or_else(|| {
                    RefactorError::invalid(format!(
                        "target package {} has no production files",
                        pkg.import_path
                    ))
                })?;
            return Ok(Target {
                id: Some(id),
                name: pkg.name.clone(),
                import_path: pkg.import_path.clone(),
                path: ws.file(file).path.clone(),
                file: Some(file),
            });
        }
        if !self.create_target {
            return Err(RefactorError::not_found(
                &self.to_package,
                "workspace packages",
                ws.packages().iter().map(|p| p.import_path.clone()),
            ));
        }
        let spec = match ws.module() {
            Some(module) => self
                .to_package
                .strip_prefix(module)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(&self.to_package),
            None => &self.to_package,
        };
        let dir = normalize_dir(spec);
        let import_path = ws.import_path_for_dir(&dir);
        let name = default_package_name(&import_path);
        check_identifier(&name)?;
        Ok(Target {
            id: None,
            path: dir.join(format!("{name}.go")),
            name,
            import_path,
            file: None,
        })
    }

    fn analyze(&self, cx: &Context<'_>) -> Result<Analysis, RefactorError> {
        let ws = cx.ws;
        let source = cx.package(&self.from_package)?;
        let symbol = cx.resolver().resolve(source, &self.symbol)?;
        let target = self.target(cx)?;
        if target.id == Some(source) {
            return Err(RefactorError::invalid(format!(
                "{} is already in package {}",
                self.symbol, target.import_path
            )));
        }

        let sym = ws.symbol(symbol);
        let mut spans: BTreeMap<FileId, Vec<DeclSpan>> = BTreeMap::new();
        spans
            .entry(sym.file)
            .or_default()
            .push(decl_span(ws.file(sym.file), sym));
        if sym.kind == SymbolKind::Type {
            for m in ws.package(source).symbols.methods_of(&sym.name) {
                let method = ws.symbol(*m);
                if method.kind == SymbolKind::Method && !method.in_interface {
                    spans
                        .entry(method.file)
                        .or_default()
                        .push(decl_span(ws.file(method.file), method));
                }
            }
        }
        for list in spans.values_mut() {
            list.sort_by_key(|s| s.removal.start);
        }
        Ok(Analysis {
            source,
            symbol,
            target,
            spans,
        })
    }

    fn transplant<'a>(&self, cx: &Context<'a>, a: &Analysis, file: FileId) -> Transplant<'a> {
        let ws = cx.ws;
        let source_qualifier = a
            .target
            .file
            .and_then(|f| ws.qualifier_for(f, a.source))
            .unwrap_or_else(|| ws.package(a.source).name.clone());
        Transplant {
            ws: cx.ws,
            index: cx.index,
            file,
            target: a.target.id,
            target_import_path: a.target.import_path.clone(),
            source_qualifier,
            keep: vec![a.symbol],
        }
    }

    /// Name under which `file` will refer to the target package.
    fn target_qualifier(ws: &Workspace, a: &Analysis, file: FileId) -> String {
        a.target
            .id
            .and_then(|t| ws.qualifier_for(file, t))
            .unwrap_or_else(|| a.target.name.clone())
    }
}

impl Operation for MoveSymbol {
    fn kind(&self) -> OperationKind {
        OperationKind::MoveSymbol
    }

    fn describe(&self) -> String {
        format!(
            "move {} from {} to {}",
            self.symbol, self.from_package, self.to_package
        )
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let ws = cx.ws;
        let a = self.analyze(cx)?;
        let sym = ws.symbol(a.symbol);

        if let Some(target) = a.target.id {
            if ws.package(target).symbols.lookup(&sym.name).is_some() {
                return Err(RefactorError::conflict(
                    &sym.name,
                    format!("package {}", a.target.import_path),
                ));
            }
        }

        let uses = cx.index.uses(a.symbol);
        let outside: Vec<_> = uses
            .iter()
            .filter(|r| !within(&r.range(), &a.removed(r.file)))
            .collect();

        if !sym.exported() {
            if let Some(r) = outside
                .iter()
                .find(|r| Some(r.package) != a.target.id || ws.file(r.file).external_test)
            {
                return Err(RefactorError::visibility(format!(
                    "unexported {} is used from {} and would become inaccessible",
                    sym.name,
                    ws.package(r.package).import_path
                ))
                .at(&r.path, Some(r.line)));
            }
        }

        let mut uses_source = false;
        let mut imported = BTreeSet::new();
        for (file, spans) in &a.spans {
            let t = self.transplant(cx, &a, *file);
            for span in spans {
                let out = t.render(span.body.clone(), Vec::new());
                if let Some(name) = out.unexported.first() {
                    return Err(RefactorError::visibility(format!(
                        "{} refers to unexported {name} of {}",
                        sym.name,
                        ws.package(a.source).import_path
                    ))
                    .at(&ws.file(*file).path, Some(ws.file(*file).line_of(span.body.start))));
                }
                uses_source |= out.uses_source;
                imported.extend(out.imports.into_iter().map(|(path, _)| path));
            }
        }

        // Import edges the move introduces.
        let node = a.target.node(ws);
        let mut edges = Vec::new();
        if uses_source {
            edges.push((node, a.source));
        }
        for path in &imported {
            if let Some(dep) = ws.package_by_import_path(path) {
                edges.push((node, dep));
            }
        }
        for r in &outside {
            let file = ws.file(r.file);
            if Some(r.package) != a.target.id && !file.external_test {
                edges.push((r.package, node));
            }
        }
        let mut graph = ws.graph().clone();
        for (from, to) in &edges {
            graph.add_edge(*from, *to);
        }
        let name_of = |id: PackageId| {
            if Some(id) == a.target.id || id == node {
                a.target.import_path.clone()
            } else {
                ws.package(id).import_path.clone()
            }
        };
        for (from, to) in &edges {
            if from == to || graph.transitively_imports(*to, *from) {
                return Err(RefactorError::cycle(format!(
                    "moving {} makes {} import {} which already depends on it",
                    sym.name,
                    name_of(*from),
                    name_of(*to)
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let a = self.analyze(cx)?;
        let sym = ws.symbol(a.symbol);
        let source_pkg = ws.package(a.source);
        let mut plan = Plan::for_operation(self.clone().into());
        plan.touch_package(source_pkg.import_path.clone());
        plan.touch_package(a.target.import_path.clone());

        let mut editors: BTreeMap<FileId, ImportEditor<'_>> = BTreeMap::new();
        let mut dead: BTreeMap<FileId, Vec<Range<usize>>> = BTreeMap::new();
        let mut moved = Vec::new();
        let mut target_imports: Vec<(String, Option<String>)> = Vec::new();
        let mut uses_source = false;

        // Declarations leave the source files.
        for (file_id, spans) in &a.spans {
            let file = ws.file(*file_id);
            let t = self.transplant(cx, &a, *file_id);
            for span in spans {
                let out = t.render(span.body.clone(), Vec::new());
                uses_source |= out.uses_source;
                target_imports.extend(out.imports);
                moved.push(span.render(&file.source, &out.text));
            }
            let removals = tidy_removals(&file.source, spans.iter().map(|s| s.removal.clone()).collect());
            for range in &removals {
                plan.push(Change::delete(
                    &file.path,
                    &file.source,
                    range.clone(),
                    format!("move {}: remove declaration", sym.name),
                ));
            }
            dead.entry(*file_id).or_default().extend(removals);
            editors.entry(*file_id).or_insert_with(|| ImportEditor::new(file));
        }
        if uses_source {
            target_imports.push((source_pkg.import_path.clone(), None));
        }
        target_imports.retain(|(path, _)| path != &a.target.import_path);

        // References follow the declaration.
        let mut importers = BTreeSet::new();
        for r in cx.index.uses(a.symbol) {
            let file = ws.file(r.file);
            if within(&r.range(), &a.removed(r.file)) {
                continue;
            }
            let in_target = Some(r.package) == a.target.id && !file.external_test;
            let qualifier = Self::target_qualifier(ws, &a, r.file);
            match (&r.qualifier, in_target) {
                (Some(q), true) => {
                    plan.push(Change::span(
                        &file.path,
                        &file.source,
                        q.start..r.offset,
                        "",
                        "qualified references",
                    ));
                    dead.entry(r.file).or_default().push(q.clone());
                }
                (Some(q), false) => {
                    plan.push(Change::span(
                        &file.path,
                        &file.source,
                        q.clone(),
                        qualifier,
                        "qualified references",
                    ));
                    dead.entry(r.file).or_default().push(q.clone());
                }
                (None, _) => {
                    plan.push(Change::insert(
                        &file.path,
                        r.offset,
                        format!("{qualifier}."),
                        "qualified references",
                    ));
                }
            }
            if !in_target {
                editors
                    .entry(r.file)
                    .or_insert_with(|| ImportEditor::new(file))
                    .add(&a.target.import_path, None);
                if !file.external_test {
                    importers.insert(r.package);
                }
            } else {
                editors.entry(r.file).or_insert_with(|| ImportEditor::new(file));
            }
            plan.touch_package(ws.package(r.package).import_path.clone());
        }

        // Imports that only served deleted code or rewritten qualifiers.
        let mut dropped_source: BTreeMap<PackageId, usize> = BTreeMap::new();
        for (file_id, editor) in editors.iter_mut() {
            let spans = dead.get(file_id).cloned().unwrap_or_default();
            prune_imports(ws, editor, &spans);
            if editor.removes(&source_pkg.import_path) {
                *dropped_source.entry(ws.file(*file_id).package).or_default() += 1;
            }
        }

        // Declarations arrive in the target file.
        let body = moved.join("\n\n");
        match a.target.file {
            Some(target_file) => {
                let file = ws.file(target_file);
                let src = &file.source;
                let bare = file.imports.decls.is_empty()
                    && src[file.imports.package_clause_end..].trim().is_empty();
                let mut text = String::new();
                if !src.ends_with('\n') {
                    text.push('\n');
                }
                if bare {
                    text.push('\n');
                    text.push_str(&import_block(&target_imports));
                    text.push_str(&body);
                } else {
                    text.push('\n');
                    text.push_str(&body);
                    let editor = editors
                        .entry(target_file)
                        .or_insert_with(|| ImportEditor::new(file));
                    for (path, alias) in &target_imports {
                        editor.add(path, alias.as_deref());
                    }
                }
                text.push('\n');
                plan.push(Change::insert(
                    &file.path,
                    src.len(),
                    text,
                    format!("move {}: declaration", sym.name),
                ));
            }
            None => {
                let header = format!("package {}\n", a.target.name);
                let text = format!("\n{}{body}\n", import_block(&target_imports));
                plan.create_file(&a.target.path, header.clone());
                plan.push(Change::insert(
                    &a.target.path,
                    header.len(),
                    text,
                    format!("move {}: declaration", sym.name),
                ));
            }
        }

        for editor in editors.values() {
            plan.extend(editor.changes());
        }

        for pkg in importers {
            plan.impact.new_import_edges.insert(ImportEdge {
                from: ws.package(pkg).import_path.clone(),
                to: a.target.import_path.clone(),
            });
        }
        for (path, _) in &target_imports {
            if ws.package_by_import_path(path).is_some() {
                plan.impact.new_import_edges.insert(ImportEdge {
                    from: a.target.import_path.clone(),
                    to: path.clone(),
                });
            }
        }
        for (pkg, dropped) in dropped_source {
            let importing = ws
                .package(pkg)
                .files
                .values()
                .filter(|f| ws.file(**f).imports.find(&source_pkg.import_path).is_some())
                .count();
            if pkg != a.source && dropped >= importing {
                plan.impact.removed_import_edges.insert(ImportEdge {
                    from: ws.package(pkg).import_path.clone(),
                    to: source_pkg.import_path.clone(),
                });
            }
        }
        debug!(
            symbol = %sym.name,
            target = %a.target.import_path,
            changes = plan.changes.len(),
            "move planned"
        );
        Ok(plan)
    }
}

/// Move a package's files to another directory, rewriting every import of
/// its path. With `new_name` the package clause and unaliased qualifiers
/// change too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePackage {
    pub package: String,
    pub to_dir: String,
    #[serde(default)]
    pub new_name: Option<String>,
}

impl MovePackage {
    fn rename(&self, cx: &Context<'_>) -> Option<RenamePackage> {
        let id = cx.ws.find_package(&self.package)?;
        let name = self.new_name.as_ref()?;
        (name != &cx.ws.package(id).name).then(|| RenamePackage {
            package: self.package.clone(),
            new_name: name.clone(),
            update_imports: true,
        })
    }
}

impl Operation for MovePackage {
    fn kind(&self) -> OperationKind {
        OperationKind::MovePackage
    }

    fn describe(&self) -> String {
        format!("move package {} to {}", self.package, self.to_dir)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let id = cx.package(&self.package)?;
        let to = normalize_dir(&self.to_dir);
        let pkg = cx.ws.package(id);
        if to == pkg.dir {
            return Err(RefactorError::invalid(format!(
                "package {} already lives in {}",
                pkg.import_path,
                to.display()
            )));
        }
        if let Some(other) = cx.ws.package_by_dir(&to) {
            return Err(RefactorError::conflict(
                to.display().to_string(),
                format!("workspace (package {})", cx.ws.package(other).import_path),
            ));
        }
        if let Some(rename) = self.rename(cx) {
            rename.validate(cx)?;
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let id = cx.package(&self.package)?;
        let pkg = ws.package(id);
        let to = normalize_dir(&self.to_dir);
        let new_path = ws.import_path_for_dir(&to);
        let mut plan = Plan::for_operation(self.clone().into());
        plan.touch_package(pkg.import_path.clone());
        plan.touch_package(new_path.clone());

        for file in pkg.all_files() {
            let file = ws.file(file);
            plan.move_file(&file.path, to.join(file.file_name()));
        }

        for file in ws.files() {
            for spec in file.imports.specs.iter().filter(|s| s.path == pkg.import_path) {
                plan.push(Change::span(
                    &file.path,
                    &file.source,
                    spec.path_range.clone(),
                    format!("\"{new_path}\""),
                    "import path",
                ));
                plan.touch_package(ws.package(file.package).import_path.clone());
            }
        }

        if let Some(rename) = self.rename(cx) {
            let renamed = rename.execute(cx)?;
            plan.extend(renamed.changes);
            plan.impact.merge(renamed.impact);
        }
        Ok(plan)
    }
}

/// Move every package under `from_dir` to the same relative place under
/// `to_dir`, as one atomic batch of package moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDirectory {
    pub from_dir: String,
    pub to_dir: String,
}

impl MoveDirectory {
    fn steps(&self, ws: &Workspace) -> Vec<AnyOperation> {
        let from = normalize_dir(&self.from_dir);
        let to = normalize_dir(&self.to_dir);
        ws.packages()
            .iter()
            .filter_map(|p| {
                let rel = p.dir.strip_prefix(&from).ok()?;
                let dest = if rel.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(rel)
                };
                Some(
                    MovePackage {
                        package: p.import_path.clone(),
                        to_dir: dest.to_string_lossy().replace('\\', "/"),
                        new_name: None,
                    }
                    .into(),
                )
            })
            .collect()
    }
}

impl Operation for MoveDirectory {
    fn kind(&self) -> OperationKind {
        OperationKind::MoveDirectory
    }

    fn describe(&self) -> String {
        format!("move directory {} to {}", self.from_dir, self.to_dir)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let from = normalize_dir(&self.from_dir);
        let to = normalize_dir(&self.to_dir);
        if to.starts_with(&from) {
            return Err(RefactorError::invalid(format!(
                "cannot move {} into itself",
                from.display()
            )));
        }
        if self.steps(cx.ws).is_empty() {
            return Err(RefactorError::invalid(format!(
                "no packages under {}",
                Path::new(&self.from_dir).display()
            )));
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let steps = self.steps(cx.ws);
        let mut plan = BatchComposer::new(cx.ws)
            .atomic(true)
            .with_index(cx.index)
            .compose(&steps)?;
        plan.operations = vec![self.clone().into()];
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};
    use crate::plan::IssueKind;

    const SRC: &str = "package src\n\nfunc Helper() {}\n\nfunc Other() {}\n";
    const APP: &str = "package app\n\nimport \"example.com/m/src\"\n\nfunc Run() {\n\tsrc.Helper()\n\tsrc.Other()\n}\n";

    fn mv(symbol: &str, from: &str, to: &str) -> MoveSymbol {
        MoveSymbol {
            symbol: symbol.into(),
            from_package: from.into(),
            to_package: to.into(),
            create_target: true,
        }
    }

    #[test]
    fn move_into_new_package() {
        let ws = workspace(&[("src/src.go", SRC), ("app/app.go", APP)]);
        let p = plan(&ws, mv("Helper", "src", "util")).unwrap();
        assert_eq!(p.new_files.len(), 1);
        let out = applied(&ws, &p);
        assert_eq!(out["util/util.go"], "package util\n\nfunc Helper() {}\n");
        assert_eq!(out["src/src.go"], "package src\n\nfunc Other() {}\n");
        let app = &out["app/app.go"];
        assert!(app.contains("\tutil.Helper()\n"));
        assert!(app.contains("\"example.com/m/util\""));
        assert!(app.contains("\"example.com/m/src\""));
        assert!(p.reversible);
        assert!(p.impact.new_import_edges.contains(&ImportEdge {
            from: "example.com/m/app".into(),
            to: "example.com/m/util".into(),
        }));
    }

    #[test]
    fn unused_source_import_is_dropped() {
        let app = "package app\n\nimport \"example.com/m/src\"\n\nfunc Run() { src.Helper() }\n";
        let ws = workspace(&[("src/src.go", SRC), ("app/app.go", app)]);
        let p = plan(&ws, mv("Helper", "src", "util")).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(
            out["app/app.go"],
            "package app\n\nimport \"example.com/m/util\"\n\nfunc Run() { util.Helper() }\n"
        );
    }

    #[test]
    fn source_import_left_unused_goes_without_blank_gap() {
        let src = "package src\n\nimport \"fmt\"\n\nfunc Helper() { fmt.Println() }\n\nvar x = 1\n";
        let ws = workspace(&[("src/src.go", src)]);
        let p = plan(&ws, mv("Helper", "src", "util")).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(out["src/src.go"], "package src\n\nvar x = 1\n");

        let last = "package src\n\nimport \"fmt\"\n\nvar x = 1\n\nfunc Helper() { fmt.Println() }\n";
        let ws = workspace(&[("src/src.go", last)]);
        let p = plan(&ws, mv("Helper", "src", "util")).unwrap();
        assert_eq!(applied(&ws, &p)["src/src.go"], "package src\n\nvar x = 1\n");
    }

    #[test]
    fn same_package_is_invalid() {
        let ws = workspace(&[("src/src.go", SRC)]);
        let err = plan(&ws, mv("Helper", "src", "src")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
    }

    #[test]
    fn unexported_with_foreign_uses_is_rejected() {
        let src = "package src\n\nfunc helper() {}\n\nfunc Run() { helper() }\n";
        let ws = workspace(&[("src/src.go", src)]);
        let err = plan(&ws, mv("helper", "src", "util")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::VisibilityViolation);
    }

    #[test]
    fn cycle_is_detected() {
        let util = "package util\n\nimport \"example.com/m/src\"\n\nfunc Wrap() { src.Other() }\n";
        let src = "package src\n\nfunc Helper() {}\n\nfunc Other() { Helper() }\n";
        let ws = workspace(&[("src/src.go", src), ("util/util.go", util)]);
        let err = plan(&ws, mv("Helper", "src", "util")).unwrap_err();
        assert_eq!(err.kind(), IssueKind::ImportCycle);
    }

    #[test]
    fn type_moves_with_methods_and_qualifies_source_refs() {
        let src = "package src\n\nconst Limit = 3\n\n// T is a thing.\ntype T struct{ n int }\n\nfunc (t *T) Inc() { t.n += Limit }\n\nfunc (t *T) Dec() { t.n-- }\n";
        let util = "package util\n\nimport \"fmt\"\n\nvar _ = fmt.Sprint\n";
        let ws = workspace(&[("src/src.go", src), ("util/util.go", util)]);
        let p = plan(&ws, mv("T", "src", "util")).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(out["src/src.go"], "package src\n\nconst Limit = 3\n");
        let u = &out["util/util.go"];
        assert!(u.contains("// T is a thing.\ntype T struct{ n int }"));
        assert!(u.contains("func (t *T) Inc() { t.n += src.Limit }"));
        assert!(u.contains("func (t *T) Dec() { t.n-- }"));
        assert!(u.contains("import (\n\t\"fmt\"\n\t\"example.com/m/src\"\n)"));
    }

    #[test]
    fn move_package_rewrites_import_paths() {
        let ws = workspace(&[("src/src.go", SRC), ("app/app.go", APP)]);
        let op = MovePackage {
            package: "src".into(),
            to_dir: "lib/core".into(),
            new_name: Some("core".into()),
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(p.file_moves.len(), 1);
        let out = applied(&ws, &p);
        assert!(out["lib/core/src.go"].starts_with("package core\n"));
        let app = &out["app/app.go"];
        assert!(app.contains("import \"example.com/m/lib/core\""));
        assert!(app.contains("core.Helper()"));
    }

    #[test]
    fn move_package_onto_existing_dir_conflicts() {
        let ws = workspace(&[("src/src.go", SRC), ("app/app.go", APP)]);
        let op = MovePackage {
            package: "src".into(),
            to_dir: "app".into(),
            new_name: None,
        };
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::NameConflict);
    }

    #[test]
    fn move_directory_moves_nested_packages() {
        let inner = "package inner\n\nfunc X() {}\n";
        let user = "package app\n\nimport (\n\t\"example.com/m/src\"\n\t\"example.com/m/src/inner\"\n)\n\nfunc Run() { src.Helper(); inner.X() }\n";
        let ws = workspace(&[
            ("src/src.go", SRC),
            ("src/inner/inner.go", inner),
            ("app/app.go", user),
        ]);
        let op = MoveDirectory {
            from_dir: "src".into(),
            to_dir: "pkg/src".into(),
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(p.file_moves.len(), 2);
        let out = applied(&ws, &p);
        assert!(out["app/app.go"].contains("\t\"example.com/m/pkg/src\"\n\t\"example.com/m/pkg/src/inner\"\n"));
        assert!(out.contains_key("pkg/src/inner/inner.go"));
    }
}
