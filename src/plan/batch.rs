//! Sequencing several operations into one plan.

use crate::error::RefactorError;
use crate::ops::{AnyOperation, Context, Operation};
use crate::plan::{Change, Issue, IssueKind, Plan};
use crate::resolve::ReferenceIndex;
use crate::workspace::Workspace;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Composes operations planned against one workspace snapshot.
///
/// Every step is validated and executed in order. Changes from different
/// steps must not overlap; in atomic mode the first failure aborts the
/// batch, otherwise failed steps and conflicting changes are skipped and
/// the first error is kept on the returned plan.
pub struct BatchComposer<'a> {
    ws: &'a Workspace,
    atomic: bool,
    cached_index: Option<&'a ReferenceIndex>,
}

impl<'a> BatchComposer<'a> {
    pub fn new(ws: &'a Workspace) -> Self {
        Self {
            ws,
            atomic: true,
            cached_index: None,
        }
    }

    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Reuse an index built by the caller instead of building one.
    pub fn with_index(mut self, index: &'a ReferenceIndex) -> Self {
        self.cached_index = Some(index);
        self
    }

    pub fn compose(&self, steps: &[AnyOperation]) -> Result<Plan, RefactorError> {
        if steps.is_empty() {
            return Err(RefactorError::invalid("empty batch"));
        }
        let built;
        let index = match self.cached_index {
            Some(index) => index,
            None => {
                built = ReferenceIndex::build(self.ws);
                &built
            }
        };
        let cx = Context::new(self.ws, index);

        let mut plan = Plan::new();
        let mut by_file: BTreeMap<PathBuf, Vec<Change>> = BTreeMap::new();
        for (i, step) in steps.iter().enumerate() {
            let description = step.describe();
            debug!(step = i + 1, kind = %step.kind(), %description, "batch step");
            let planned = match step.plan(&cx) {
                Ok(planned) => planned,
                Err(err) => {
                    let err = err.in_step(i, &description);
                    if self.atomic {
                        return Err(err);
                    }
                    warn!(step = i + 1, error = %err, "batch step skipped");
                    plan.add_issue(Issue::error(err.kind(), err.to_string()));
                    if plan.error.is_none() {
                        plan.error = Some(err);
                    }
                    continue;
                }
            };

            let mut accepted = Vec::with_capacity(planned.changes.len());
            for change in planned.changes {
                let existing = by_file.get(&change.file).map(Vec::as_slice).unwrap_or(&[]);
                if existing.contains(&change) {
                    continue;
                }
                if let Some(prior) = existing.iter().find(|c| c.overlaps(&change)) {
                    let message = overlap_message(prior, &change);
                    if self.atomic {
                        return Err(RefactorError::invalid(message).at(&change.file, None));
                    }
                    warn!(step = i + 1, "{message}; later change dropped");
                    plan.add_issue(
                        Issue::warning(
                            IssueKind::InvalidOperation,
                            format!("{message}; change from step {} dropped", i + 1),
                        )
                        .at(&change.file, None),
                    );
                    continue;
                }
                accepted.push(change);
            }
            for change in &accepted {
                by_file
                    .entry(change.file.clone())
                    .or_default()
                    .push(change.clone());
            }

            plan.operations.extend(planned.operations);
            plan.extend(accepted);
            plan.affected_files.extend(planned.affected_files);
            plan.impact.merge(planned.impact);
            plan.reversible &= planned.reversible;
            for file in planned.new_files {
                if plan.new_file(&file.path).is_some() {
                    let err = RefactorError::conflict(
                        file.path.display().to_string(),
                        "files created by this batch",
                    );
                    if self.atomic {
                        return Err(err.in_step(i, &description));
                    }
                    plan.add_issue(Issue::warning(err.kind(), err.to_string()));
                    continue;
                }
                plan.new_files.push(file);
            }
            plan.file_moves.extend(planned.file_moves);
            if plan.error.is_none() {
                plan.error = planned.error;
            }
        }

        plan.sort();
        info!(
            steps = steps.len(),
            changes = plan.changes.len(),
            files = plan.affected_files.len(),
            failed = plan.error.is_some(),
            "batch composed"
        );
        Ok(plan)
    }
}

fn overlap_message(a: &Change, b: &Change) -> String {
    format!(
        "overlapping changes in {} at {}-{} and {}-{}",
        a.file.display(),
        a.start,
        a.end,
        b.start,
        b.end
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::workspace;
    use crate::ops::{RenameSymbol, Scope};
    use proptest::prelude::*;

    const FOO: &str = "package a\n\nfunc Foo() int { return 1 }\n\nfunc Use() int { return Foo() }\n";

    fn rename(new_name: &str) -> AnyOperation {
        RenameSymbol {
            name: "Foo".into(),
            new_name: new_name.into(),
            package: Some("a".into()),
            scope: Scope::Package,
        }
        .into()
    }

    #[test]
    fn empty_batch_is_invalid() {
        let ws = workspace(&[("a/a.go", FOO)]);
        let err = BatchComposer::new(&ws).compose(&[]).unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
    }

    #[test]
    fn atomic_overlap_fails_without_plan() {
        let ws = workspace(&[("a/a.go", FOO)]);
        let err = BatchComposer::new(&ws)
            .compose(&[rename("Bar"), rename("Baz")])
            .unwrap_err();
        assert_eq!(err.kind(), IssueKind::InvalidOperation);
        let text = err.to_string();
        let spans: Vec<String> = FOO
            .match_indices("Foo")
            .map(|(s, _)| format!("at {s}-{end} and {s}-{end}", end = s + 3))
            .collect();
        assert!(text.contains("overlapping changes in a/a.go"));
        assert!(spans.iter().any(|s| text.contains(s.as_str())));
    }

    #[test]
    fn non_atomic_overlap_keeps_first_change() {
        let ws = workspace(&[("a/a.go", FOO)]);
        let plan = BatchComposer::new(&ws)
            .atomic(false)
            .compose(&[rename("Bar"), rename("Baz")])
            .unwrap();
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.new_text == "Bar"));
        assert!(plan
            .issues()
            .iter()
            .any(|i| i.message.contains("overlapping changes")));
        assert!(plan.error.is_none());
    }

    #[test]
    fn atomic_failure_cites_step() {
        let ws = workspace(&[("a/a.go", FOO)]);
        let missing = RenameSymbol {
            name: "Nope".into(),
            new_name: "X".into(),
            package: Some("a".into()),
            scope: Scope::Package,
        };
        let err = BatchComposer::new(&ws)
            .compose(&[rename("Bar"), missing.clone().into()])
            .unwrap_err();
        assert!(err.to_string().contains("step 2"));

        let plan = BatchComposer::new(&ws)
            .atomic(false)
            .compose(&[missing.into(), rename("Bar")])
            .unwrap();
        assert_eq!(plan.changes.len(), 2);
        let first = plan.error.as_ref().expect("first error kept");
        assert!(first.to_string().contains("step 1"));
        assert!(plan.has_errors());
    }

    #[test]
    fn identical_changes_are_merged() {
        let ws = workspace(&[("a/a.go", FOO)]);
        let plan = BatchComposer::new(&ws)
            .compose(&[rename("Bar"), rename("Bar")])
            .unwrap();
        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.operations.len(), 2);
        assert!(plan.changes[0].start > plan.changes[1].start);
    }

    proptest! {
        #[test]
        fn disjoint_spans_never_reported(a in 0usize..100, len in 1usize..10, gap in 0usize..10) {
            let first = Change::replace("f.go", a..a + len, "", "x", "t");
            let second = Change::replace("f.go", a + len + gap..a + len + gap + len, "", "y", "t");
            prop_assert!(!first.overlaps(&second));
            let msg = overlap_message(&first, &second);
            prop_assert!(msg.starts_with("overlapping changes in f.go at "));
        }
    }
}
