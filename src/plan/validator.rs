//! Pre-apply checks over a composed plan.

use crate::ops::common::check_identifier;
use crate::ops::{AnyOperation, Operation};
use crate::plan::{apply_in_memory, Change, Issue, IssueKind, Plan, Severity};
use crate::ts::{parses_as_any, validate_rewrite, validate_snippet, SnippetCategory};
use crate::workspace::{DependencyGraph, PackageId, Workspace};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Descriptions of changes whose new text is a fragment (argument list,
/// import line, qualifier) rather than a standalone piece of Go.
const FRAGMENT_MARKERS: &[&str] = &[
    "parameters",
    "interface method",
    "call",
    "argument",
    "import",
    "qualified references",
];

/// Outcome of [`validate_plan`]: the plan's own issues followed by the
/// validator's findings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// No issue blocks application.
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(Issue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }
}

/// Check `plan` against the workspace it was built from. With
/// `allow_breaking` every error is reported as a warning instead.
pub fn validate_plan(plan: &Plan, ws: &Workspace, allow_breaking: bool) -> ValidationReport {
    let mut issues = plan.issues().to_vec();
    check_spans(plan, ws, &mut issues);
    check_overlaps(plan, &mut issues);
    check_operations(plan, &mut issues);
    check_import_graph(plan, ws, &mut issues);
    check_fragments(plan, &mut issues);
    if !issues.iter().any(Issue::is_error) {
        check_rewrites(plan, ws, &mut issues);
    }

    if allow_breaking {
        for issue in &mut issues {
            if issue.severity == Severity::Error {
                issue.severity = Severity::Warning;
            }
        }
    }
    let report = ValidationReport { issues };
    debug!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "plan validated"
    );
    report
}

fn check_spans(plan: &Plan, ws: &Workspace, issues: &mut Vec<Issue>) {
    for change in &plan.changes {
        let error = |message: String| {
            Issue::error(IssueKind::InvalidOperation, message).at(&change.file, None)
        };
        if change.start > change.end {
            issues.push(error(format!(
                "change starts after it ends ({}-{})",
                change.start, change.end
            )));
            continue;
        }
        let source = match ws.file_by_path(&change.file) {
            Some(id) => ws.file(id).source.as_str(),
            None => match plan.new_file(&change.file) {
                Some(new) => new.content.as_str(),
                None => {
                    issues.push(error("change targets a file outside the workspace".into()));
                    continue;
                }
            },
        };
        if change.end > source.len() {
            issues.push(error(format!(
                "change {}-{} runs past the end of the file ({} bytes)",
                change.start,
                change.end,
                source.len()
            )));
            continue;
        }
        if !change.old_text.is_empty() && source.get(change.range()) != Some(&*change.old_text) {
            issues.push(error(format!(
                "recorded text at {}-{} no longer matches the file",
                change.start, change.end
            )));
        }
    }
}

fn check_overlaps(plan: &Plan, issues: &mut Vec<Issue>) {
    let mut by_file: BTreeMap<&Path, Vec<&Change>> = BTreeMap::new();
    for change in &plan.changes {
        by_file.entry(&change.file).or_default().push(change);
    }
    for (file, mut changes) in by_file {
        changes.sort_by_key(|c| (c.start, c.end));
        for (i, a) in changes.iter().enumerate() {
            for b in &changes[i + 1..] {
                if b.start > a.end {
                    break;
                }
                if a.overlaps(b) {
                    issues.push(
                        Issue::error(
                            IssueKind::InvalidOperation,
                            format!(
                                "overlapping changes in {} at {}-{} and {}-{}",
                                file.display(),
                                a.start,
                                a.end,
                                b.start,
                                b.end
                            ),
                        )
                        .at(file, None),
                    );
                }
            }
        }
    }
}

fn check_operations(plan: &Plan, issues: &mut Vec<Issue>) {
    for op in &plan.operations {
        let new_name = match op {
            AnyOperation::RenameSymbol(op) => Some(&op.new_name),
            AnyOperation::RenameMethod(op) => Some(&op.new_name),
            AnyOperation::RenameInterfaceMethod(op) => Some(&op.new_name),
            AnyOperation::RenamePackage(op) => Some(&op.new_name),
            _ => None,
        };
        if let Some(name) = new_name {
            if let Err(err) = check_identifier(name) {
                issues.push(Issue::error(err.kind(), err.to_string()));
            }
        }
        if let AnyOperation::RenameMethod(op) = op {
            if !op.update_implementations && op.new_name != op.method {
                issues.push(Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!(
                        "renaming {}.{} may break interface compliance or method sets",
                        op.type_name, op.method
                    ),
                ));
            }
        }
    }
}

/// The import graph after the plan's edge changes must not gain a cycle.
fn check_import_graph(plan: &Plan, ws: &Workspace, issues: &mut Vec<Issue>) {
    let edges = &plan.impact;
    if edges.new_import_edges.is_empty() {
        return;
    }
    // Packages the plan creates get ids past the loaded ones.
    let mut fresh: BTreeMap<String, PackageId> = BTreeMap::new();
    let mut node = |path: &str| -> PackageId {
        if let Some(id) = ws.package_by_import_path(path) {
            return id;
        }
        let next = PackageId((ws.packages().len() + fresh.len()) as u32);
        *fresh.entry(path.to_string()).or_insert(next)
    };
    let before: &DependencyGraph = ws.graph();
    let mut after = before.clone();
    for edge in &edges.removed_import_edges {
        let (from, to) = (node(&edge.from), node(&edge.to));
        after.remove_edge(from, to);
    }
    let added: Vec<_> = edges
        .new_import_edges
        .iter()
        .map(|edge| (edge, node(&edge.from), node(&edge.to)))
        .collect();
    for (_, from, to) in &added {
        after.add_edge(*from, *to);
    }
    for (edge, from, to) in added {
        if before.imports_directly(from, to) {
            continue;
        }
        if from == to || after.transitively_imports(to, from) {
            issues.push(Issue::error(
                IssueKind::ImportCycle,
                format!(
                    "import of {} by {} creates an import cycle",
                    edge.to, edge.from
                ),
            ));
        }
    }
}

fn check_fragments(plan: &Plan, issues: &mut Vec<Issue>) {
    for change in &plan.changes {
        let text = change.new_text.trim();
        if text.is_empty() || FRAGMENT_MARKERS.iter().any(|m| change.description.contains(m)) {
            continue;
        }
        if !parses_as_any(text) {
            issues.push(
                Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!("generated text for '{}' may not parse", change.description),
                )
                .at(&change.file, None),
            );
        }
    }
    for file in &plan.new_files {
        if validate_snippet(&file.content, SnippetCategory::File).is_err() {
            issues.push(
                Issue::warning(IssueKind::CompilationSuspect, "generated file may not parse")
                    .at(&file.path, None),
            );
        }
    }
}

/// Whole-file check: the edited text must not gain syntax errors the
/// original did not have. Only run on plans whose spans are sound.
fn check_rewrites(plan: &Plan, ws: &Workspace, issues: &mut Vec<Issue>) {
    let Ok(rewritten) = apply_in_memory(plan, ws) else {
        return;
    };
    let edited: BTreeSet<&Path> = plan.changes.iter().map(|c| c.file.as_path()).collect();
    for path in edited {
        let Some(id) = ws.file_by_path(path) else {
            continue;
        };
        let target = plan
            .file_moves
            .iter()
            .find(|m| m.from == path)
            .map_or(path, |m| m.to.as_path());
        let Some(text) = rewritten.get(target) else {
            continue;
        };
        if let Err(err) = validate_rewrite(&ws.file(id).source, text) {
            issues.push(
                Issue::warning(
                    IssueKind::CompilationSuspect,
                    format!("edited file no longer parses cleanly: {err}"),
                )
                .at(target, None),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{plan, workspace};
    use crate::ops::{MoveSymbol, RenameMethod, RenameSymbol, Scope};
    use crate::plan::ImportEdge;

    const A: &str = "package a\n\nfunc Foo() int { return 1 }\n";

    #[test]
    fn clean_rename_passes() {
        let ws = workspace(&[("a/a.go", A)]);
        let op = RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: "Bar".into(),
            scope: Scope::Package,
        };
        let p = plan(&ws, op).unwrap();
        let report = validate_plan(&p, &ws, false);
        assert!(report.is_ok(), "{:?}", report.issues);
        assert_eq!(report.warnings().count(), 0);
    }

    #[test]
    fn overlaps_and_stale_text_are_errors() {
        let ws = workspace(&[("a/a.go", A)]);
        let mut p = Plan::new();
        p.push(Change::replace("a/a.go", 16..19, "Foo", "X", "edit"));
        p.push(Change::replace("a/a.go", 17..20, "nope", "Y", "edit"));
        let report = validate_plan(&p, &ws, false);
        let messages: Vec<_> = report.errors().map(|i| i.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("overlapping changes in a/a.go at 16-19 and 17-20")));
        assert!(messages.iter().any(|m| m.contains("no longer matches")));

        let relaxed = validate_plan(&p, &ws, true);
        assert!(relaxed.is_ok());
        assert!(relaxed.warnings().count() >= 2);
    }

    #[test]
    fn unparsable_fragment_is_suspect() {
        let ws = workspace(&[("a/a.go", A)]);
        let mut p = Plan::new();
        p.push(Change::insert("a/a.go", A.len(), "\nfunc (", "new function"));
        p.push(Change::insert("a/a.go", 9, ", x int", "argument list"));
        let report = validate_plan(&p, &ws, false);
        assert!(report.is_ok());
        let suspects: Vec<_> = report
            .warnings()
            .filter(|i| i.kind == IssueKind::CompilationSuspect)
            .collect();
        assert_eq!(suspects.len(), 2);
        assert!(suspects[0].message.contains("new function"));
        assert!(suspects[1].message.contains("no longer parses"));
        assert_eq!(suspects[1].file.as_deref(), Some(Path::new("a/a.go")));
    }

    #[test]
    fn rewrite_keeping_existing_errors_is_quiet() {
        let broken = "package a

func Foo() int { return 1 }

func (
";
        let ws = workspace(&[("a/a.go", broken)]);
        let op = RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: "Bar".into(),
            scope: Scope::Package,
        };
        let report = validate_plan(&plan(&ws, op).unwrap(), &ws, false);
        assert!(report.is_ok());
        assert!(!report
            .warnings()
            .any(|i| i.message.contains("no longer parses")));
    }

    #[test]
    fn method_rename_warns() {
        let src = "package a\n\ntype T struct{}\n\nfunc (T) Run() {}\n";
        let ws = workspace(&[("a/a.go", src)]);
        let op = RenameMethod {
            package: Some("a".into()),
            type_name: "T".into(),
            method: "Run".into(),
            new_name: "Start".into(),
            update_implementations: false,
        };
        let p = plan(&ws, op).unwrap();
        let report = validate_plan(&p, &ws, false);
        assert!(report.is_ok());
        assert!(report
            .warnings()
            .any(|i| i.message.contains("interface compliance")));
    }

    #[test]
    fn new_edge_closing_a_cycle_is_rejected() {
        let a = "package a\n\nimport \"example.com/m/b\"\n\nvar A = b.B\n";
        let b = "package b\n\nvar B = 1\n";
        let ws = workspace(&[("a/a.go", a), ("b/b.go", b)]);
        let mut p = Plan::new();
        p.impact.new_import_edges.insert(ImportEdge {
            from: "example.com/m/b".into(),
            to: "example.com/m/a".into(),
        });
        let report = validate_plan(&p, &ws, false);
        assert!(report.errors().any(|i| i.kind == IssueKind::ImportCycle));

        let op = MoveSymbol {
            symbol: "B".into(),
            from_package: "b".into(),
            to_package: "example.com/m/c".into(),
            create_target: true,
        };
        let moved = plan(&ws, op).unwrap();
        assert!(validate_plan(&moved, &ws, false).is_ok());
    }
}
