//! Facade packages: generated files that re-export the exported API of one
//! or more source packages through aliases (`type X = src.X`,
//! `const C = src.C`, `var F = src.F`).

use crate::error::RefactorError;
use crate::ops::common::{check_identifier, import_block, own_line, prune_imports, ImportEditor};
use crate::ops::{AnyOperation, Context, Operation, OperationKind};
use crate::plan::{BatchComposer, Change, ImportEdge, Issue, IssueKind, Plan};
use crate::ts::nodes;
use crate::workspace::{default_package_name, PackageId, SourceFile, SymbolKind, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::PathBuf;
use tracing::{debug, info};
use tree_sitter::Node;

/// First line of every generated facade file.
pub const GENERATED_HEADER: &str = "// Code generated by gorefactor. DO NOT EDIT.";

pub const DEFAULT_FACADE_FILE: &str = "facade.go";

/// Write a facade package re-exporting `symbols` (default: every exported
/// top-level symbol) of `sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFacade {
    /// Facade package: an existing package or a new workspace directory.
    pub package: String,
    pub sources: Vec<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// One facade per source package, under `output_dir/<source dir>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateFacades {
    /// Empty means every package with exported symbols.
    #[serde(default)]
    pub sources: Vec<String>,
    pub output_dir: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Regenerate an existing facade file: drop entries whose source symbol is
/// gone and, with `add_new`, append newly exported symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFacade {
    pub package: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub add_new: bool,
}

struct FacadeTarget {
    id: Option<PackageId>,
    dir: PathBuf,
    name: String,
    import_path: String,
}

fn facade_target(ws: &Workspace, spec: &str) -> Result<FacadeTarget, RefactorError> {
    if let Some(id) = ws.find_package(spec) {
        let pkg = ws.package(id);
        return Ok(FacadeTarget {
            id: Some(id),
            dir: pkg.dir.clone(),
            name: pkg.name.clone(),
            import_path: pkg.import_path.clone(),
        });
    }
    let rel = match ws.module() {
        Some(module) => spec
            .strip_prefix(module)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(spec),
        None => spec,
    };
    let dir = PathBuf::from(rel.trim_start_matches("./").trim_end_matches('/'));
    let import_path = ws.import_path_for_dir(&dir);
    let name = default_package_name(&import_path);
    check_identifier(&name)?;
    Ok(FacadeTarget {
        id: None,
        dir,
        name,
        import_path,
    })
}

/// Declaration keyword and sort rank of a re-exportable symbol kind.
fn entry_keyword(kind: SymbolKind) -> Option<(&'static str, u8)> {
    match kind {
        SymbolKind::Type | SymbolKind::Interface => Some(("type", 0)),
        SymbolKind::Constant => Some(("const", 1)),
        SymbolKind::Variable => Some(("var", 2)),
        SymbolKind::Function => Some(("var", 3)),
        _ => None,
    }
}

/// Exported production symbols of `pkg`, in facade order.
fn exported(ws: &Workspace, pkg: PackageId) -> Vec<(&'static str, u8, String)> {
    let table = &ws.package(pkg).symbols;
    let mut out: Vec<(&'static str, u8, String)> = table
        .types
        .values()
        .chain(table.functions.values())
        .chain(table.variables.values())
        .chain(table.constants.values())
        .map(|id| ws.symbol(*id))
        .filter(|s| s.exported() && s.name != "_" && !ws.file(s.file).is_test)
        .filter_map(|s| entry_keyword(s.kind).map(|(kw, rank)| (kw, rank, s.name.clone())))
        .collect();
    out.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));
    out
}

fn entry_line(keyword: &str, name: &str, qualifier: &str) -> String {
    format!("{keyword} {name} = {qualifier}.{name}\n")
}

impl CreateFacade {
    fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_FACADE_FILE)
    }

    fn sources(&self, cx: &Context<'_>) -> Result<Vec<PackageId>, RefactorError> {
        if self.sources.is_empty() {
            return Err(RefactorError::invalid("a facade needs at least one source package"));
        }
        let mut out = Vec::new();
        for spec in &self.sources {
            let id = cx.package(spec)?;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn render(&self, cx: &Context<'_>, plan: &mut Plan) -> Result<(PathBuf, String), RefactorError> {
        let ws = cx.ws;
        let target = facade_target(ws, &self.package)?;
        let sources = self.sources(cx)?;
        let wanted: BTreeSet<&str> = self.symbols.iter().map(String::as_str).collect();

        let mut taken: BTreeSet<String> = BTreeSet::new();
        let mut emitted: BTreeMap<String, String> = BTreeMap::new();
        let mut imports = Vec::new();
        let mut blocks = Vec::new();
        for src in sources {
            let pkg = ws.package(src);
            let mut qualifier = pkg.name.clone();
            let mut n = 2;
            while taken.contains(&qualifier) {
                qualifier = format!("{}{n}", pkg.name);
                n += 1;
            }
            taken.insert(qualifier.clone());

            let mut lines = String::new();
            for (keyword, _, name) in exported(ws, src) {
                if !wanted.is_empty() && !wanted.contains(name.as_str()) {
                    continue;
                }
                if let Some(first) = emitted.get(&name) {
                    plan.add_issue(Issue::warning(
                        IssueKind::NameConflict,
                        format!("{name} from {} skipped: already re-exported from {first}", pkg.import_path),
                    ));
                    continue;
                }
                emitted.insert(name.clone(), pkg.import_path.clone());
                lines.push_str(&entry_line(keyword, &name, &qualifier));
            }
            if lines.is_empty() {
                continue;
            }
            let alias = (qualifier != pkg.name).then(|| qualifier.clone());
            imports.push((pkg.import_path.clone(), alias));
            plan.impact.new_import_edges.insert(ImportEdge {
                from: target.import_path.clone(),
                to: pkg.import_path.clone(),
            });
            blocks.push(format!("// Re-exported from {}.\n{lines}", pkg.import_path));
        }
        if blocks.is_empty() {
            return Err(RefactorError::invalid(format!(
                "nothing to re-export into {}",
                target.import_path
            )));
        }
        let content = format!(
            "{GENERATED_HEADER}\n\npackage {}\n\n{}{}",
            target.name,
            import_block(&imports),
            blocks.join("\n")
        );
        plan.touch_package(target.import_path.clone());
        Ok((target.dir.join(self.file_name()), content))
    }
}

impl Operation for CreateFacade {
    fn kind(&self) -> OperationKind {
        OperationKind::CreateFacade
    }

    fn describe(&self) -> String {
        format!("create facade {} over {}", self.package, self.sources.join(", "))
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let ws = cx.ws;
        let target = facade_target(ws, &self.package)?;
        let sources = self.sources(cx)?;
        if let Some(id) = target.id {
            if sources.contains(&id) {
                return Err(RefactorError::invalid(format!(
                    "{} cannot re-export itself",
                    target.import_path
                )));
            }
            if ws.package(id).files.contains_key(self.file_name()) {
                return Err(RefactorError::conflict(
                    self.file_name(),
                    format!("package {} (use update-facade)", target.import_path),
                ));
            }
            for src in &sources {
                if ws.graph().transitively_imports(*src, id) {
                    return Err(RefactorError::cycle(format!(
                        "{} already depends on {}",
                        ws.package(*src).import_path,
                        target.import_path
                    )));
                }
            }
        }
        for name in &self.symbols {
            let found = sources
                .iter()
                .find_map(|src| ws.package(*src).symbols.lookup(name));
            match found {
                None => {
                    return Err(RefactorError::not_found(
                        name,
                        self.sources.join(", "),
                        sources
                            .iter()
                            .flat_map(|src| exported(ws, *src).into_iter().map(|e| e.2)),
                    ))
                }
                Some(id) if !ws.symbol(id).exported() => {
                    return Err(RefactorError::visibility(format!(
                        "{name} is unexported and cannot be re-exported"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let mut plan = Plan::for_operation(self.clone().into());
        let (path, content) = self.render(cx, &mut plan)?;
        info!(path = %path.display(), "facade planned");
        plan.create_file(path, content);
        Ok(plan)
    }
}

impl GenerateFacades {
    fn steps(&self, cx: &Context<'_>) -> Result<Vec<AnyOperation>, RefactorError> {
        let ws = cx.ws;
        let out_dir = PathBuf::from(self.output_dir.trim_start_matches("./").trim_end_matches('/'));
        let sources: Vec<PackageId> = if self.sources.is_empty() {
            ws.packages()
                .iter()
                .filter(|p| p.name != "main" && !p.dir.starts_with(&out_dir))
                .filter(|p| !exported(ws, p.id).is_empty())
                .map(|p| p.id)
                .collect()
        } else {
            self.sources
                .iter()
                .map(|s| cx.package(s))
                .collect::<Result<_, _>>()?
        };
        Ok(sources
            .into_iter()
            .map(|id| {
                let pkg = ws.package(id);
                let dir = out_dir.join(&pkg.dir);
                CreateFacade {
                    package: dir.to_string_lossy().replace('\\', "/"),
                    sources: vec![pkg.import_path.clone()],
                    symbols: Vec::new(),
                    file_name: self.file_name.clone(),
                }
                .into()
            })
            .collect())
    }
}

impl Operation for GenerateFacades {
    fn kind(&self) -> OperationKind {
        OperationKind::GenerateFacades
    }

    fn describe(&self) -> String {
        format!("generate facades under {}", self.output_dir)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        if self.steps(cx)?.is_empty() {
            return Err(RefactorError::invalid("no package has exported symbols"));
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let steps = self.steps(cx)?;
        debug!(facades = steps.len(), "generating facades");
        let mut plan = BatchComposer::new(cx.ws)
            .atomic(true)
            .with_index(cx.index)
            .compose(&steps)?;
        plan.operations = vec![self.clone().into()];
        Ok(plan)
    }
}

/// A `name = qualifier.name` line of a facade file.
struct FacadeEntry {
    name: String,
    qualifier: String,
    target: String,
    /// Bytes to delete when the entry is stale.
    removal: Range<usize>,
}

fn selector_parts(node: Node<'_>, src: &str) -> Option<(String, String)> {
    match node.kind() {
        "selector_expression" => {
            let op = node.child_by_field_name("operand")?;
            let field = node.child_by_field_name("field")?;
            (op.kind() == "identifier")
                .then(|| (nodes::text(op, src).to_string(), nodes::text(field, src).to_string()))
        }
        "qualified_type" => {
            let pkg = node.child_by_field_name("package")?;
            let name = node.child_by_field_name("name")?;
            Some((nodes::text(pkg, src).to_string(), nodes::text(name, src).to_string()))
        }
        _ => None,
    }
}

fn facade_entries(root: Node<'_>, src: &str) -> Vec<FacadeEntry> {
    let mut out = Vec::new();
    for decl in nodes::named_children(root) {
        let (spec_kind, value_field) = match decl.kind() {
            "type_declaration" => ("type_alias", "type"),
            "const_declaration" => ("const_spec", "value"),
            "var_declaration" => ("var_spec", "value"),
            _ => continue,
        };
        let specs = nodes::specs(decl, spec_kind);
        let single = specs.len() == 1 && nodes::named_children(decl).len() == 1;
        for spec in &specs {
            let names = nodes::field_children(*spec, "name");
            let [name] = names.as_slice() else {
                continue;
            };
            let Some(value) = spec.child_by_field_name(value_field) else {
                continue;
            };
            let value = match nodes::named_children(value).as_slice() {
                [only] if value.kind() == "expression_list" => *only,
                _ => value,
            };
            let Some((qualifier, target)) = selector_parts(value, src) else {
                continue;
            };
            let range = if single { decl.byte_range() } else { spec.byte_range() };
            out.push(FacadeEntry {
                name: nodes::text(*name, src).to_string(),
                qualifier,
                target,
                removal: own_line(src, range),
            });
        }
    }
    out
}

impl UpdateFacade {
    fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_FACADE_FILE)
    }

    fn facade_file<'a>(&self, cx: &Context<'a>) -> Result<&'a SourceFile, RefactorError> {
        let ws = cx.ws;
        let pkg = ws.package(cx.package(&self.package)?);
        let id = pkg.files.get(self.file_name()).ok_or_else(|| {
            RefactorError::not_found(
                self.file_name(),
                format!("package {}", pkg.import_path),
                pkg.files.keys().cloned(),
            )
        })?;
        Ok(ws.file(*id))
    }
}

impl Operation for UpdateFacade {
    fn kind(&self) -> OperationKind {
        OperationKind::UpdateFacade
    }

    fn describe(&self) -> String {
        format!("update facade {}", self.package)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        let file = self.facade_file(cx)?;
        if !file.source.starts_with(GENERATED_HEADER) {
            return Err(RefactorError::invalid(format!(
                "{} is not a generated facade",
                file.path.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        let file = self.facade_file(cx)?;
        let src = &file.source;
        let entries = facade_entries(file.root(), src);

        let mut dead = Vec::new();
        let mut sources: BTreeMap<String, PackageId> = BTreeMap::new();
        for entry in &entries {
            let Some(pkg) = ws.package_for_qualifier(file.id, &entry.qualifier) else {
                continue;
            };
            sources.insert(entry.qualifier.clone(), pkg);
            let alive = ws
                .package(pkg)
                .symbols
                .lookup(&entry.target)
                .is_some_and(|id| ws.symbol(id).exported());
            if !alive {
                plan.push(Change::delete(
                    &file.path,
                    src,
                    entry.removal.clone(),
                    "stale facade entry",
                ));
                plan.add_issue(
                    Issue::info(
                        IssueKind::SymbolNotFound,
                        format!("dropped {}: {}.{} no longer exists", entry.name, entry.qualifier, entry.target),
                    )
                    .at(&file.path, Some(file.line_of(entry.removal.start))),
                );
                dead.push(entry.removal.clone());
            }
        }

        if self.add_new {
            let facade_pkg = &ws.package(file.package).symbols;
            let mut text = String::new();
            for (qualifier, pkg) in &sources {
                let mut lines = String::new();
                for (keyword, _, name) in exported(ws, *pkg) {
                    if facade_pkg.lookup(&name).is_some() {
                        continue;
                    }
                    lines.push_str(&entry_line(keyword, &name, qualifier));
                }
                if !lines.is_empty() {
                    text.push_str(&format!(
                        "\n// Added from {}.\n{lines}",
                        ws.package(*pkg).import_path
                    ));
                }
            }
            if !text.is_empty() {
                if !src.ends_with('\n') {
                    text.insert(0, '\n');
                }
                plan.push(Change::insert(&file.path, src.len(), text, "new facade entries"));
                dead.clear();
            }
        }

        if !dead.is_empty() {
            let mut editor = ImportEditor::new(file);
            prune_imports(ws, &mut editor, &dead);
            plan.extend(editor.changes());
        }
        plan.touch_package(ws.package(file.package).import_path.clone());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};

    const STORE: &str = "package store\n\ntype Item struct{}\n\nconst Limit = 3\n\nfunc Save(i Item) error { return nil }\n\nfunc helper() {}\n";
    const UTIL: &str = "package util\n\nvar Default = 1\n";

    fn create(package: &str, sources: &[&str], symbols: &[&str]) -> CreateFacade {
        CreateFacade {
            package: package.into(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            file_name: None,
        }
    }

    #[test]
    fn facade_re_exports_every_exported_symbol() {
        let ws = workspace(&[("store/store.go", STORE), ("util/util.go", UTIL)]);
        let p = plan(&ws, create("api", &["store", "util"], &[])).unwrap();
        assert_eq!(p.new_files.len(), 1);
        assert_eq!(
            applied(&ws, &p)["api/facade.go"],
            "// Code generated by gorefactor. DO NOT EDIT.\n\npackage api\n\nimport (\n\t\"example.com/m/store\"\n\t\"example.com/m/util\"\n)\n\n// Re-exported from example.com/m/store.\ntype Item = store.Item\nconst Limit = store.Limit\nvar Save = store.Save\n\n// Re-exported from example.com/m/util.\nvar Default = util.Default\n"
        );
        assert_eq!(p.impact.new_import_edges.len(), 2);
    }

    #[test]
    fn selected_symbols_are_checked() {
        let ws = workspace(&[("store/store.go", STORE)]);
        let err = plan(&ws, create("api", &["store"], &["helper"])).unwrap_err();
        assert_eq!(err.kind(), IssueKind::VisibilityViolation);
        let err = plan(&ws, create("api", &["store"], &["Nope"])).unwrap_err();
        assert_eq!(err.kind(), IssueKind::SymbolNotFound);
        let p = plan(&ws, create("api", &["store"], &["Item"])).unwrap();
        let out = applied(&ws, &p);
        assert!(out["api/facade.go"].contains("type Item = store.Item\n"));
        assert!(!out["api/facade.go"].contains("Limit"));
    }

    #[test]
    fn facade_over_an_importer_is_a_cycle() {
        let api = "package api\n\nconst Version = 1\n";
        let store = "package store\n\nimport \"example.com/m/api\"\n\nconst V = api.Version\n";
        let ws = workspace(&[("api/api.go", api), ("store/store.go", store)]);
        let err = plan(&ws, create("api", &["store"], &[])).unwrap_err();
        assert_eq!(err.kind(), IssueKind::ImportCycle);
    }

    #[test]
    fn generate_builds_one_facade_per_package() {
        let ws = workspace(&[("store/store.go", STORE), ("util/util.go", UTIL)]);
        let op = GenerateFacades {
            sources: vec!["store".into()],
            output_dir: "facades".into(),
            file_name: None,
        };
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert!(out["facades/store/facade.go"].contains("package store\n"));
        assert_eq!(p.operations.len(), 1);
    }

    #[test]
    fn update_drops_stale_and_adds_new_entries() {
        let facade = "// Code generated by gorefactor. DO NOT EDIT.\n\npackage api\n\nimport \"example.com/m/store\"\n\n// Re-exported from example.com/m/store.\ntype Item = store.Item\nconst Gone = store.Gone\n";
        let store = "package store\n\ntype Item struct{}\n\nfunc Fresh() {}\n";
        let ws = workspace(&[("api/facade.go", facade), ("store/store.go", store)]);
        let op = UpdateFacade {
            package: "api".into(),
            file_name: None,
            add_new: true,
        };
        let p = plan(&ws, op).unwrap();
        assert_eq!(
            applied(&ws, &p)["api/facade.go"],
            "// Code generated by gorefactor. DO NOT EDIT.\n\npackage api\n\nimport \"example.com/m/store\"\n\n// Re-exported from example.com/m/store.\ntype Item = store.Item\n\n// Added from example.com/m/store.\nvar Fresh = store.Fresh\n"
        );
    }

    #[test]
    fn update_refuses_hand_written_files() {
        let ws = workspace(&[("api/facade.go", "package api\n")]);
        let op = UpdateFacade {
            package: "api".into(),
            file_name: None,
            add_new: false,
        };
        assert_eq!(plan(&ws, op).unwrap_err().kind(), IssueKind::InvalidOperation);
    }
}
