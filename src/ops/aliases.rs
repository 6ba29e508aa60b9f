//! Import alias maintenance. Every alias change also rewrites the qualified
//! uses of the import in the same file.

use crate::error::RefactorError;
use crate::ops::common::{bound_names, check_identifier, is_keyword, qualifier_sites};
use crate::ops::{Context, Operation, OperationKind};
use crate::plan::{Change, Issue, IssueKind, Plan};
use crate::workspace::{default_package_name, ImportSpec, SourceFile, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Files the alias operations look at: one package (tests included) or the
/// whole workspace.
fn files_in_scope<'a>(
    cx: &Context<'a>,
    package: Option<&str>,
) -> Result<Vec<&'a SourceFile>, RefactorError> {
    let ws = cx.ws;
    match package {
        Some(spec) => {
            let pkg = cx.package(spec)?;
            Ok(ws
                .package(pkg)
                .all_files()
                .map(|f| ws.file(f))
                .collect())
        }
        None => Ok(ws.files().iter().collect()),
    }
}

/// Name a path binds without an alias.
fn default_name(ws: &Workspace, path: &str) -> String {
    match ws.package_by_import_path(path) {
        Some(id) => ws.package(id).name.clone(),
        None => default_package_name(path),
    }
}

/// Rebind `spec` to `alias` (`None` drops the alias) and rewrite the
/// qualified uses of its old local name.
fn realias(
    plan: &mut Plan,
    ws: &Workspace,
    file: &SourceFile,
    spec: &ImportSpec,
    alias: Option<&str>,
) {
    let src = &file.source;
    let old = ws.import_local_name(spec);
    let new = alias.map_or_else(|| default_name(ws, &spec.path), str::to_string);
    match (&spec.alias_range, alias) {
        (Some(range), Some(alias)) => {
            plan.push(Change::span(&file.path, src, range.clone(), alias, "import alias"))
        }
        (Some(range), None) => plan.push(Change::delete(
            &file.path,
            src,
            range.start..spec.path_range.start,
            "import alias",
        )),
        (None, Some(alias)) => plan.push(Change::insert(
            &file.path,
            spec.path_range.start,
            format!("{alias} "),
            "import alias",
        )),
        (None, None) => {}
    }
    if old != new {
        for site in qualifier_sites(file, &old) {
            plan.push(Change::span(&file.path, src, site, &new, "qualified references"));
        }
    }
    plan.touch_package(ws.package(file.package).import_path.clone());
}

fn with_suffix(base: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(base) && !is_keyword(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Drop aliases that merely repeat the package's own name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanAliases {
    #[serde(default)]
    pub package: Option<String>,
}

impl Operation for CleanAliases {
    fn kind(&self) -> OperationKind {
        OperationKind::CleanAliases
    }

    fn describe(&self) -> String {
        "remove redundant import aliases".to_string()
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        files_in_scope(cx, self.package.as_deref()).map(|_| ())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        for file in files_in_scope(cx, self.package.as_deref())? {
            for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
                if spec.alias.as_deref() == Some(default_name(ws, &spec.path).as_str()) {
                    realias(&mut plan, ws, file, spec, None);
                }
            }
        }
        Ok(plan)
    }
}

/// Make every importer of a path use one local name: `alias` when given,
/// otherwise the most common one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardizeAliases {
    #[serde(default)]
    pub package: Option<String>,
    /// Limit to one import path.
    #[serde(default)]
    pub import_path: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl StandardizeAliases {
    /// Chosen local name per import path.
    fn choices(&self, ws: &Workspace, files: &[&SourceFile]) -> BTreeMap<String, String> {
        let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut aliased = BTreeSet::new();
        for file in files {
            for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
                if self.import_path.as_ref().is_some_and(|p| p != &spec.path) {
                    continue;
                }
                if spec.alias.is_some() {
                    aliased.insert(spec.path.clone());
                }
                *counts
                    .entry(spec.path.clone())
                    .or_default()
                    .entry(ws.import_local_name(spec))
                    .or_default() += 1;
            }
        }
        counts
            .into_iter()
            .filter(|(path, _)| self.import_path.is_some() || aliased.contains(path))
            .filter_map(|(path, names)| {
                let chosen = match &self.alias {
                    Some(alias) => alias.clone(),
                    None => {
                        let default = default_name(ws, &path);
                        names
                            .iter()
                            .max_by(|a, b| {
                                a.1.cmp(b.1)
                                    .then((a.0 == &default).cmp(&(b.0 == &default)))
                                    .then(b.0.cmp(a.0))
                            })
                            .map(|(name, _)| name.clone())?
                    }
                };
                Some((path, chosen))
            })
            .collect()
    }
}

impl Operation for StandardizeAliases {
    fn kind(&self) -> OperationKind {
        OperationKind::StandardizeAliases
    }

    fn describe(&self) -> String {
        match &self.import_path {
            Some(path) => format!("standardize the alias of {path}"),
            None => "standardize import aliases".to_string(),
        }
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        if let Some(alias) = &self.alias {
            check_identifier(alias)?;
            if self.import_path.is_none() {
                return Err(RefactorError::invalid(
                    "an explicit alias needs an import_path",
                ));
            }
        }
        files_in_scope(cx, self.package.as_deref()).map(|_| ())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        let files = files_in_scope(cx, self.package.as_deref())?;
        let choices = self.choices(ws, &files);
        debug!(paths = choices.len(), "standardizing aliases");
        for file in files {
            let bound = bound_names(ws, file);
            for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
                let Some(chosen) = choices.get(&spec.path) else {
                    continue;
                };
                let current = ws.import_local_name(spec);
                if &current == chosen {
                    continue;
                }
                if bound.contains(chosen) {
                    plan.add_issue(
                        Issue::warning(
                            IssueKind::NameConflict,
                            format!("'{chosen}' is already bound; {} keeps '{current}'", spec.path),
                        )
                        .at(&file.path, Some(file.line_of(spec.spec_range.start))),
                    );
                    continue;
                }
                let alias = (chosen != &default_name(ws, &spec.path)).then_some(chosen.as_str());
                realias(&mut plan, ws, file, spec, alias);
            }
        }
        Ok(plan)
    }
}

/// Give distinct aliases to imports whose local names collide in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveAliasConflicts {
    #[serde(default)]
    pub package: Option<String>,
}

/// `<parent><name>` for `a/b/parent/name`, skipping version elements.
fn parent_alias(path: &str, name: &str) -> String {
    let elements: Vec<&str> = path.split('/').filter(|e| !is_version(e)).collect();
    let parent = elements
        .len()
        .checked_sub(2)
        .and_then(|i| elements.get(i))
        .map(|p| sanitize(p))
        .unwrap_or_default();
    format!("{parent}{name}")
}

fn is_version(element: &str) -> bool {
    element
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn sanitize(element: &str) -> String {
    element
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

impl Operation for ResolveAliasConflicts {
    fn kind(&self) -> OperationKind {
        OperationKind::ResolveAliasConflicts
    }

    fn describe(&self) -> String {
        "resolve import name conflicts".to_string()
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        files_in_scope(cx, self.package.as_deref()).map(|_| ())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        for file in files_in_scope(cx, self.package.as_deref())? {
            let specs: Vec<&ImportSpec> =
                file.imports.specs.iter().filter(|s| s.is_qualifying()).collect();
            let mut by_name: BTreeMap<String, Vec<&ImportSpec>> = BTreeMap::new();
            for spec in &specs {
                by_name
                    .entry(ws.import_local_name(spec))
                    .or_default()
                    .push(spec);
            }
            let mut taken = bound_names(ws, file);
            for (name, group) in by_name.into_iter().filter(|(_, g)| g.len() > 1) {
                for spec in group.into_iter().skip(1) {
                    let alias = with_suffix(&parent_alias(&spec.path, &name), &taken);
                    taken.insert(alias.clone());
                    debug!(file = %file.path.display(), path = %spec.path, %alias, "conflicting import");
                    self.rebind(&mut plan, cx, file, spec, &alias);
                }
            }
        }
        Ok(plan)
    }
}

impl ResolveAliasConflicts {
    /// Qualified uses of a shadowed import cannot be told apart by
    /// spelling; only uses bound to the workspace package are rewritten.
    fn rebind(
        &self,
        plan: &mut Plan,
        cx: &Context<'_>,
        file: &SourceFile,
        spec: &ImportSpec,
        alias: &str,
    ) {
        let ws = cx.ws;
        let src = &file.source;
        match &spec.alias_range {
            Some(range) => plan.push(Change::span(&file.path, src, range.clone(), alias, "import alias")),
            None => plan.push(Change::insert(
                &file.path,
                spec.path_range.start,
                format!("{alias} "),
                "import alias",
            )),
        }
        plan.touch_package(ws.package(file.package).import_path.clone());
        match ws.package_by_import_path(&spec.path) {
            Some(pkg) => {
                for r in cx.index.in_file(file.id) {
                    if ws.symbol(r.symbol).package != pkg {
                        continue;
                    }
                    if let Some(q) = &r.qualifier {
                        plan.push(Change::span(&file.path, src, q.clone(), alias, "qualified references"));
                    }
                }
            }
            None => plan.add_issue(
                Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!("uses of {} now need the qualifier '{alias}'", spec.path),
                )
                .at(&file.path, Some(file.line_of(spec.spec_range.start))),
            ),
        }
    }
}

/// Give every unaliased import an explicit short alias.
///
/// The alias is the last non-version element of the path, lowercased with
/// non-alphanumerics stripped and cut to `length` characters; collisions
/// with keywords or names already bound in the file get a numeric suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertToAliases {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub import_path: Option<String>,
    #[serde(default = "default_length")]
    pub length: usize,
}

fn default_length() -> usize {
    crate::config::DEFAULT_ALIAS_LENGTH
}

impl Default for ConvertToAliases {
    fn default() -> Self {
        Self {
            package: None,
            import_path: None,
            length: default_length(),
        }
    }
}

/// Short alias for `path` under the codified policy, before collisions.
pub fn derived_alias(path: &str, length: usize) -> String {
    let last = path
        .split('/')
        .filter(|e| !is_version(e))
        .next_back()
        .unwrap_or(path);
    let mut alias: String = sanitize(last).chars().take(length.max(1)).collect();
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, 'p');
    }
    alias
}

impl Operation for ConvertToAliases {
    fn kind(&self) -> OperationKind {
        OperationKind::ConvertToAliases
    }

    fn describe(&self) -> String {
        format!("convert imports to {}-letter aliases", self.length)
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        if self.length == 0 {
            return Err(RefactorError::invalid("alias length must be at least 1"));
        }
        files_in_scope(cx, self.package.as_deref()).map(|_| ())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let ws = cx.ws;
        let mut plan = Plan::for_operation(self.clone().into());
        for file in files_in_scope(cx, self.package.as_deref())? {
            let mut taken = bound_names(ws, file);
            for spec in file.imports.specs.iter().filter(|s| s.is_qualifying()) {
                if spec.alias.is_some() || self.import_path.as_ref().is_some_and(|p| p != &spec.path) {
                    continue;
                }
                let current = ws.import_local_name(spec);
                let base = derived_alias(&spec.path, self.length);
                if base == current {
                    continue;
                }
                taken.remove(&current);
                let alias = with_suffix(&base, &taken);
                taken.insert(alias.clone());
                realias(&mut plan, ws, file, spec, Some(&alias));
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};
    use proptest::prelude::*;

    #[test]
    fn clean_drops_redundant_aliases() {
        let src = "package app\n\nimport (\n\tstrings \"strings\"\n\tu \"example.com/m/util\"\n)\n\nvar _ = strings.ToUpper(u.Name)\n";
        let util = "package util\n\nconst Name = \"n\"\n";
        let ws = workspace(&[("app/app.go", src), ("util/util.go", util)]);
        let p = plan(&ws, CleanAliases::default()).unwrap();
        assert_eq!(
            applied(&ws, &p)["app/app.go"],
            "package app\n\nimport (\n\t\"strings\"\n\tu \"example.com/m/util\"\n)\n\nvar _ = strings.ToUpper(u.Name)\n"
        );
    }

    #[test]
    fn standardize_picks_the_common_alias() {
        let util = "package util\n\nconst Name = \"n\"\n";
        let a = "package app\n\nimport u \"example.com/m/util\"\n\nvar A = u.Name\n";
        let b = "package app\n\nimport ut \"example.com/m/util\"\n\nvar B = ut.Name\n";
        let c = "package app\n\nimport u \"example.com/m/util\"\n\nvar C = u.Name\n";
        let ws = workspace(&[
            ("util/util.go", util),
            ("app/a.go", a),
            ("app/b.go", b),
            ("app/c.go", c),
        ]);
        let p = plan(&ws, StandardizeAliases::default()).unwrap();
        let out = applied(&ws, &p);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out["app/b.go"],
            "package app\n\nimport u \"example.com/m/util\"\n\nvar B = u.Name\n"
        );
    }

    #[test]
    fn conflicting_imports_get_parent_prefixed_alias() {
        let ea = "package errors\n\nconst A = 1\n";
        let eb = "package errors\n\nconst B = 2\n";
        let app = "package app\n\nimport (\n\t\"example.com/m/a/errors\"\n\t\"example.com/m/b/errors\"\n)\n";
        let ws = workspace(&[("a/errors/e.go", ea), ("b/errors/e.go", eb), ("app/app.go", app)]);
        let p = plan(&ws, ResolveAliasConflicts::default()).unwrap();
        assert!(applied(&ws, &p)["app/app.go"].contains("\tberrors \"example.com/m/b/errors\"\n"));
    }

    #[test]
    fn convert_adds_short_aliases_with_suffixes() {
        let src = "package app\n\nimport (\n\t\"strconv\"\n\t\"strings\"\n)\n\nfunc F(s string) string {\n\treturn strings.ToUpper(s) + strconv.Itoa(1)\n}\n";
        let ws = workspace(&[("app/app.go", src)]);
        let p = plan(&ws, ConvertToAliases::default()).unwrap();
        assert_eq!(
            applied(&ws, &p)["app/app.go"],
            "package app\n\nimport (\n\tstr \"strconv\"\n\tstr2 \"strings\"\n)\n\nfunc F(s string) string {\n\treturn str2.ToUpper(s) + str.Itoa(1)\n}\n"
        );
    }

    #[test]
    fn derived_alias_policy() {
        assert_eq!(derived_alias("net/http", 3), "htt");
        assert_eq!(derived_alias("github.com/x/go-yaml/v3", 4), "goya");
        assert_eq!(derived_alias("fmt", 3), "fmt");
        assert_eq!(derived_alias("example.com/9p", 3), "p9p");
    }

    proptest! {
        #[test]
        fn derived_alias_is_a_short_identifier(path in "[a-z0-9./_-]{1,30}", len in 1usize..6) {
            let alias = derived_alias(&path, len);
            prop_assert!(alias.len() <= len + 1);
            prop_assert!(crate::ops::common::is_valid_identifier(&alias));
        }
    }
}
