//! Turning a plan into text: previews, unified diffs, and the bytes that
//! end up on disk.

use crate::edit::{self, Edit, EditResult};
use crate::error::RefactorError;
use crate::ops::Operation;
use crate::plan::{Change, Plan};
use crate::safety::WorkspaceGuard;
use crate::workspace::Workspace;
use similar::TextDiff;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Longest old/new text shown per change in a preview.
const PREVIEW_WIDTH: usize = 40;

/// What [`apply`] did, by workspace-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub edited: Vec<PathBuf>,
    /// Files whose changes were already present.
    pub unchanged: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub removed_dirs: Vec<PathBuf>,
    pub changes: usize,
}

impl ApplySummary {
    pub fn files_touched(&self) -> usize {
        self.edited.len() + self.created.len() + self.moved.len()
    }
}

/// Snapshot text of a workspace file, or the initial content of a file the
/// plan creates.
fn base_text<'p>(plan: &'p Plan, ws: &'p Workspace, path: &Path) -> Option<&'p str> {
    match ws.file_by_path(path) {
        Some(id) => Some(ws.file(id).source.as_str()),
        None => plan.new_file(path).map(|f| f.content.as_str()),
    }
}

/// Verified edits of one file; `expected` comes from the planning
/// snapshot so the recorded text need not be present on the change.
fn edits_for(root: &Path, base: &str, changes: &[&Change]) -> Vec<Edit> {
    changes
        .iter()
        .map(|c| {
            let expected = base.get(c.range()).unwrap_or(c.old_text.as_str());
            Edit::from_change(root, c, expected)
        })
        .collect()
}

fn grouped(plan: &Plan) -> BTreeMap<&Path, Vec<&Change>> {
    let mut by_file: BTreeMap<&Path, Vec<&Change>> = BTreeMap::new();
    for change in &plan.changes {
        by_file.entry(change.file.as_path()).or_default().push(change);
    }
    by_file
}

/// Post-apply text of every file the plan touches, keyed by its final
/// workspace-relative path. Nothing is written.
pub fn apply_in_memory(
    plan: &Plan,
    ws: &Workspace,
) -> Result<BTreeMap<PathBuf, String>, RefactorError> {
    let mut out: BTreeMap<PathBuf, String> = BTreeMap::new();
    for new in &plan.new_files {
        out.insert(new.path.clone(), new.content.clone());
    }
    for (file, changes) in grouped(plan) {
        let base = base_text(plan, ws, file).ok_or_else(|| {
            RefactorError::filesystem("change targets a file outside the workspace").at(file, None)
        })?;
        let edits = edits_for(Path::new(""), base, &changes);
        let (text, _) = edit::splice(base, &edits)?;
        out.insert(file.to_path_buf(), text);
    }
    for mv in &plan.file_moves {
        let text = match out.remove(&mv.from) {
            Some(text) => text,
            None => base_text(plan, ws, &mv.from)
                .ok_or_else(|| {
                    RefactorError::filesystem("moved file is not in the workspace")
                        .at(&mv.from, None)
                })?
                .to_string(),
        };
        out.insert(mv.to.clone(), text);
    }
    Ok(out)
}

fn clip(text: &str) -> String {
    let flat = text.replace('\n', "\\n").replace('\t', "\\t");
    if flat.chars().count() <= PREVIEW_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(PREVIEW_WIDTH).collect();
    cut.push('…');
    cut
}

/// Human-readable report: every change with its position, then created
/// and moved files, the impact summary and the issues.
pub fn render_preview(plan: &Plan, ws: &Workspace) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} change(s) in {} file(s)",
        plan.changes.len(),
        plan.affected_files.len()
    );
    for op in &plan.operations {
        let _ = writeln!(out, "  {}: {}", op.kind(), op.describe());
    }

    if !plan.changes.is_empty() {
        out.push('\n');
    }
    for change in &plan.changes {
        let (line, col) = match ws.file_by_path(&change.file) {
            Some(id) => ws.file(id).line_col(change.start),
            None => base_text(plan, ws, &change.file)
                .map(|text| line_col(text, change.start))
                .unwrap_or((1, 1)),
        };
        let old = base_text(plan, ws, &change.file)
            .and_then(|text| text.get(change.range()))
            .unwrap_or(change.old_text.as_str());
        let _ = writeln!(
            out,
            "{}:{line}:{col}  \"{}\" → \"{}\"  ({})",
            change.file.display(),
            clip(old),
            clip(&change.new_text),
            change.description
        );
    }

    for new in &plan.new_files {
        let _ = writeln!(out, "create {} ({} bytes)", new.path.display(), new.content.len());
    }
    for mv in &plan.file_moves {
        let _ = writeln!(out, "move {} -> {}", mv.from.display(), mv.to.display());
    }

    let impact = &plan.impact;
    if !impact.affected_packages.is_empty() {
        let names: Vec<&str> = impact.affected_packages.iter().map(String::as_str).collect();
        let _ = writeln!(out, "\naffected packages: {}", names.join(", "));
    }
    for edge in &impact.new_import_edges {
        let _ = writeln!(out, "  + import {} -> {}", edge.from, edge.to);
    }
    for edge in &impact.removed_import_edges {
        let _ = writeln!(out, "  - import {} -> {}", edge.from, edge.to);
    }
    if !impact.coupling.is_empty() {
        let _ = writeln!(out, "\ncoupling (Ca / Ce / instability):");
        for m in &impact.coupling {
            let _ = writeln!(
                out,
                "  {:<40} {:>3} {:>3} {:.2}",
                m.package, m.afferent, m.efferent, m.instability
            );
        }
    }
    for cycle in &impact.cycles {
        let _ = writeln!(out, "cycle: {}", cycle.join(" -> "));
    }
    if !impact.suggested_moves.is_empty() {
        let _ = writeln!(out, "\nsuggested moves:");
        for m in &impact.suggested_moves {
            let _ = writeln!(
                out,
                "  {} from {} to {} ({})",
                m.symbol, m.from_package, m.to_package, m.reason
            );
        }
    }
    if !impact.issues.is_empty() {
        out.push('\n');
        for issue in &impact.issues {
            let _ = writeln!(out, "{issue}");
        }
    }
    if let Some(err) = &plan.error {
        let _ = writeln!(out, "first failure: {err}");
    }
    out
}

fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(before.len(), |i| before.len() - i - 1) + 1;
    (line, col)
}

/// Unified diff of every affected file against the snapshot.
pub fn render_diff(plan: &Plan, ws: &Workspace) -> Result<String, RefactorError> {
    let after = apply_in_memory(plan, ws)?;
    let moved_to: BTreeMap<&Path, &Path> = plan
        .file_moves
        .iter()
        .map(|m| (m.to.as_path(), m.from.as_path()))
        .collect();
    let mut out = String::new();
    for (path, new_text) in &after {
        let origin = moved_to.get(path.as_path()).copied().unwrap_or(path.as_path());
        let old_text = ws
            .file_by_path(origin)
            .map(|id| ws.file(id).source.as_str())
            .unwrap_or("");
        if old_text == new_text && origin == path.as_path() {
            continue;
        }
        let diff = TextDiff::from_lines(old_text, new_text.as_str());
        let old_header = if old_text.is_empty() && ws.file_by_path(origin).is_none() {
            "/dev/null".to_string()
        } else {
            format!("a/{}", origin.display())
        };
        let _ = write!(
            out,
            "{}",
            diff.unified_diff()
                .context_radius(3)
                .header(&old_header, &format!("b/{}", path.display()))
        );
    }
    Ok(out)
}

/// Write the plan to disk.
///
/// Every path is checked against the workspace guard before anything is
/// written. New files are created first, then each edited file is
/// rewritten atomically with verified edits, then file moves run and
/// directories they leave empty are removed.
pub fn apply(plan: &Plan, ws: &Workspace) -> Result<ApplySummary, RefactorError> {
    let root = ws.root();
    let guard = WorkspaceGuard::new(root)?;
    let by_file = grouped(plan);

    for new in &plan.new_files {
        let target = guard.validate_new_path(&new.path)?;
        if target.exists() {
            return Err(RefactorError::conflict(
                new.path.display().to_string(),
                "workspace (file already exists)",
            ));
        }
    }
    for file in by_file.keys() {
        if plan.new_file(file).is_none() {
            guard.validate_path(file)?;
        }
    }
    for mv in &plan.file_moves {
        guard.validate_path(&mv.from)?;
        let dest = guard.validate_new_path(&mv.to)?;
        if dest.exists() {
            return Err(RefactorError::conflict(
                mv.to.display().to_string(),
                "workspace (move destination exists)",
            ));
        }
    }

    let mut summary = ApplySummary {
        changes: plan.changes.len(),
        ..ApplySummary::default()
    };

    for new in &plan.new_files {
        let changes = by_file.get(new.path.as_path()).map(Vec::as_slice).unwrap_or(&[]);
        let (content, _) = edit::splice(&new.content, &edits_for(root, &new.content, changes))?;
        let target = root.join(&new.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        edit::atomic_write(&target, content.as_bytes())?;
        debug!(file = %new.path.display(), "created");
        summary.created.push(new.path.clone());
    }

    let mut edits = Vec::new();
    for (file, changes) in &by_file {
        if plan.new_file(file).is_some() {
            continue;
        }
        let base = ws
            .file_by_path(file)
            .map(|id| ws.file(id).source.as_str())
            .ok_or_else(|| {
                RefactorError::filesystem("change targets a file outside the workspace")
                    .at(*file, None)
            })?;
        edits.extend(edits_for(root, base, changes));
    }
    for result in edit::apply_batch(edits)? {
        match result {
            EditResult::Applied { file, .. } => summary.edited.push(relative(root, &file)),
            EditResult::AlreadyApplied { file } => summary.unchanged.push(relative(root, &file)),
        }
    }

    let mut vacated = BTreeSet::new();
    for mv in &plan.file_moves {
        let (from, to) = (root.join(&mv.from), root.join(&mv.to));
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)?;
        if let Some(parent) = mv.from.parent() {
            vacated.insert(parent.to_path_buf());
        }
        summary.moved.push((mv.from.clone(), mv.to.clone()));
    }
    // Deepest first so emptied parents go too.
    for dir in vacated.iter().rev() {
        let mut current = Some(dir.as_path());
        while let Some(rel) = current.filter(|d| !d.as_os_str().is_empty()) {
            let abs = root.join(rel);
            let empty = fs::read_dir(&abs).map(|mut d| d.next().is_none()).unwrap_or(false);
            if !empty {
                break;
            }
            fs::remove_dir(&abs)?;
            summary.removed_dirs.push(rel.to_path_buf());
            current = rel.parent();
        }
    }

    info!(
        edited = summary.edited.len(),
        created = summary.created.len(),
        moved = summary.moved.len(),
        changes = summary.changes,
        "plan applied"
    );
    Ok(summary)
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{plan, workspace};
    use crate::ops::{MovePackage, RenameSymbol, Scope};
    use crate::plan::Change;
    use crate::workspace::{load, LoadOptions};

    const A: &str = "package a\n\nfunc Foo() int { return 1 }\n";
    const B: &str = "package b\n\nimport \"example.com/m/a\"\n\nfunc Use() int { return a.Foo() }\n";

    fn rename() -> RenameSymbol {
        RenameSymbol {
            package: Some("a".into()),
            name: "Foo".into(),
            new_name: "Bar".into(),
            scope: Scope::Workspace,
        }
    }

    #[test]
    fn in_memory_image_covers_affected_files() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let p = plan(&ws, rename()).unwrap();
        let out = apply_in_memory(&p, &ws).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[Path::new("a/a.go")], "package a\n\nfunc Bar() int { return 1 }\n");
        assert!(out[Path::new("b/b.go")].contains("return a.Bar()"));
    }

    #[test]
    fn preview_lists_positions_and_truncates() {
        let ws = workspace(&[("a/a.go", A), ("b/b.go", B)]);
        let mut p = plan(&ws, rename()).unwrap();
        p.sort();
        let text = render_preview(&p, &ws);
        assert!(text.starts_with("2 change(s) in 2 file(s)"));
        assert!(text.contains("a/a.go:3:6  \"Foo\" → \"Bar\"  (rename Foo to Bar)"));
        assert!(text.contains("affected packages: example.com/m/a, example.com/m/b"));

        let long = "x".repeat(60);
        assert_eq!(clip(&long).chars().count(), PREVIEW_WIDTH + 1);
        assert!(clip(&long).ends_with('…'));
        assert_eq!(clip("a\nb"), "a\\nb");
    }

    #[test]
    fn diff_is_unified() {
        let ws = workspace(&[("a/a.go", A)]);
        let mut p = Plan::new();
        p.push(Change::span("a/a.go", A, 16..19, "Bar", "rename"));
        let diff = render_diff(&p, &ws).unwrap();
        assert!(diff.contains("--- a/a/a.go"));
        assert!(diff.contains("+++ b/a/a.go"));
        assert!(diff.contains("-func Foo() int { return 1 }"));
        assert!(diff.contains("+func Bar() int { return 1 }"));
    }

    #[test]
    fn apply_writes_edits_creations_and_moves() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("go.mod"), "module example.com/m\n\ngo 1.22\n").unwrap();
        for (path, text) in [("a/a.go", A), ("b/b.go", B)] {
            fs::create_dir_all(root.join(path).parent().unwrap()).unwrap();
            fs::write(root.join(path), text).unwrap();
        }
        let ws = load(root, &LoadOptions::default()).unwrap();

        let moved = plan(
            &ws,
            MovePackage {
                package: "a".into(),
                to_dir: "lib/a".into(),
                new_name: None,
            },
        )
        .unwrap();
        let summary = apply(&moved, &ws).unwrap();
        assert_eq!(summary.moved.len(), 1);
        assert!(root.join("lib/a/a.go").exists());
        assert!(!root.join("a").exists());
        assert_eq!(summary.removed_dirs, vec![PathBuf::from("a")]);
        let b = fs::read_to_string(root.join("b/b.go")).unwrap();
        assert!(b.contains("\"example.com/m/lib/a\""));

        let ws = load(root, &LoadOptions::default()).unwrap();
        let mut created = Plan::new();
        created.create_file("c/c.go", "package c\n");
        created.push(Change::insert("c/c.go", 10, "\nvar C = 1\n", "declaration"));
        let summary = apply(&created, &ws).unwrap();
        assert_eq!(summary.created, vec![PathBuf::from("c/c.go")]);
        assert_eq!(
            fs::read_to_string(root.join("c/c.go")).unwrap(),
            "package c\n\nvar C = 1\n"
        );
        assert!(apply(&created, &ws).is_err());
    }

    #[test]
    fn apply_refuses_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/a.go"), A).unwrap();
        let ws = load(root, &LoadOptions::default()).unwrap();
        let p = plan(
            &ws,
            RenameSymbol {
                package: Some("a".into()),
                name: "Foo".into(),
                new_name: "Bar".into(),
                scope: Scope::Package,
            },
        )
        .unwrap();
        fs::write(root.join("a/a.go"), "package a\n\nfunc Qux() int { return 1 }\n").unwrap();
        let err = apply(&p, &ws).unwrap_err();
        assert_eq!(err.kind(), crate::plan::IssueKind::FilesystemError);
    }
}
