//! Dependency-driven restructuring: coupling metrics, import cycles and
//! symbols that live in the wrong package.

use crate::error::RefactorError;
use crate::ops::moves::MoveSymbol;
use crate::ops::{AnyOperation, Context, Operation, OperationKind};
use crate::plan::{BatchComposer, CouplingMetrics, ImpactAnalysis, Issue, IssueKind, Plan, SuggestedMove};
use crate::workspace::{PackageId, SymbolId, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Analyze package dependencies and suggest moving every top-level symbol
/// that only one other package uses into that package. With `apply` the
/// suggestions run as a non-atomic batch of symbol moves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveByDependencies {
    /// Only suggest moves out of this package.
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub apply: bool,
}

/// Afferent/efferent coupling of every package, by import path.
pub fn coupling(ws: &Workspace) -> Vec<CouplingMetrics> {
    let graph = ws.graph();
    ws.packages()
        .iter()
        .map(|pkg| {
            let afferent = graph.importers_of(pkg.id).count();
            let efferent = graph.imports_of(pkg.id).count();
            let instability = match afferent + efferent {
                0 => 0.0,
                total => efferent as f64 / total as f64,
            };
            CouplingMetrics {
                package: pkg.import_path.clone(),
                afferent,
                efferent,
                instability,
            }
        })
        .collect()
}

impl MoveByDependencies {
    /// The single foreign package a symbol is used from, when it has no
    /// uses at home.
    fn sole_user(&self, cx: &Context<'_>, id: SymbolId) -> Option<PackageId> {
        let ws = cx.ws;
        let sym = ws.symbol(id);
        let mut users = BTreeSet::new();
        for r in cx.index.uses(id) {
            let file = ws.file(r.file);
            if file.is_test {
                if r.package == sym.package {
                    return None;
                }
                continue;
            }
            if r.package == sym.package {
                return None;
            }
            users.insert(r.package);
        }
        let mut users = users.into_iter();
        match (users.next(), users.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    fn suggestions(&self, cx: &Context<'_>) -> Result<Vec<(SuggestedMove, MoveSymbol)>, RefactorError> {
        let ws = cx.ws;
        let only = self.package.as_deref().map(|p| cx.package(p)).transpose()?;
        let mut out = Vec::new();
        for pkg in ws.packages() {
            if pkg.name == "main" || only.is_some_and(|o| o != pkg.id) {
                continue;
            }
            let table = &pkg.symbols;
            let candidates = table
                .functions
                .values()
                .chain(table.types.values())
                .chain(table.variables.values())
                .chain(table.constants.values());
            for id in candidates {
                let sym = ws.symbol(*id);
                if ws.file(sym.file).is_test || !table.methods_of(&sym.name).is_empty() {
                    continue;
                }
                let Some(user) = self.sole_user(cx, *id) else {
                    continue;
                };
                let to = ws.package(user);
                let step = MoveSymbol {
                    symbol: sym.name.clone(),
                    from_package: pkg.import_path.clone(),
                    to_package: to.import_path.clone(),
                    create_target: false,
                };
                if let Err(e) = step.validate(cx) {
                    debug!(symbol = %sym.name, error = %e, "move not suggested");
                    continue;
                }
                out.push((
                    SuggestedMove {
                        symbol: sym.name.clone(),
                        from_package: pkg.import_path.clone(),
                        to_package: to.import_path.clone(),
                        reason: format!("only used by {}", to.import_path),
                    },
                    step,
                ));
            }
        }
        out.sort_by(|a, b| {
            (&a.0.from_package, &a.0.symbol).cmp(&(&b.0.from_package, &b.0.symbol))
        });
        Ok(out)
    }

    fn analysis(&self, cx: &Context<'_>, suggested: Vec<SuggestedMove>) -> ImpactAnalysis {
        let ws = cx.ws;
        let mut impact = ImpactAnalysis {
            coupling: coupling(ws),
            suggested_moves: suggested,
            ..ImpactAnalysis::default()
        };
        for cycle in ws.graph().cycles() {
            let names: Vec<String> = cycle
                .iter()
                .map(|p| ws.package(*p).import_path.clone())
                .collect();
            impact.issues.push(Issue::warning(
                IssueKind::ImportCycle,
                format!("import cycle: {}", names.join(" -> ")),
            ));
            impact.cycles.push(names);
        }
        impact
    }
}

impl Operation for MoveByDependencies {
    fn kind(&self) -> OperationKind {
        OperationKind::MoveByDependencies
    }

    fn describe(&self) -> String {
        if self.apply {
            "move symbols to the packages that use them".to_string()
        } else {
            "analyze package dependencies".to_string()
        }
    }

    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
        if let Some(pkg) = &self.package {
            cx.package(pkg)?;
        }
        Ok(())
    }

    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        let found = self.suggestions(cx)?;
        info!(suggestions = found.len(), "dependency analysis done");
        let (suggested, steps): (Vec<SuggestedMove>, Vec<AnyOperation>) = found
            .into_iter()
            .map(|(s, step)| (s, step.into()))
            .unzip();

        let mut plan = if self.apply && !steps.is_empty() {
            BatchComposer::new(cx.ws)
                .atomic(false)
                .with_index(cx.index)
                .compose(&steps)?
        } else {
            Plan::new()
        };
        plan.operations = vec![self.clone().into()];
        let analysis = self.analysis(cx, suggested);
        for issue in &analysis.issues {
            plan.add_issue(issue.clone());
        }
        plan.impact.coupling = analysis.coupling;
        plan.impact.cycles = analysis.cycles;
        plan.impact.suggested_moves = analysis.suggested_moves;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{applied, plan, workspace};

    const CORE: &str = "package core\n\nfunc Shared() int { return 1 }\n\nfunc OnlyWeb() int { return 2 }\n\nfunc Local() int { return Shared() }\n";
    const WEB: &str = "package web\n\nimport \"example.com/m/core\"\n\nfunc Page() int { return core.OnlyWeb() + core.Shared() }\n";
    const CLI: &str = "package cli\n\nimport \"example.com/m/core\"\n\nfunc Run() int { return core.Shared() }\n";

    #[test]
    fn suggests_symbols_used_by_one_package() {
        let ws = workspace(&[("core/core.go", CORE), ("web/web.go", WEB), ("cli/cli.go", CLI)]);
        let p = plan(&ws, MoveByDependencies::default()).unwrap();
        assert!(p.changes.is_empty());
        let moves: Vec<_> = p
            .impact
            .suggested_moves
            .iter()
            .map(|m| (m.symbol.as_str(), m.to_package.as_str()))
            .collect();
        assert_eq!(moves, vec![("OnlyWeb", "example.com/m/web")]);
        let core = p
            .impact
            .coupling
            .iter()
            .find(|c| c.package == "example.com/m/core")
            .unwrap();
        assert_eq!((core.afferent, core.efferent), (2, 0));
        assert_eq!(core.instability, 0.0);
    }

    #[test]
    fn apply_moves_the_suggestions() {
        let ws = workspace(&[("core/core.go", CORE), ("web/web.go", WEB), ("cli/cli.go", CLI)]);
        let op = MoveByDependencies {
            package: None,
            apply: true,
        };
        let p = plan(&ws, op).unwrap();
        let out = applied(&ws, &p);
        assert!(!out["core/core.go"].contains("OnlyWeb"));
        assert!(out["web/web.go"].contains("func OnlyWeb() int { return 2 }"));
        assert!(out["web/web.go"].contains("return OnlyWeb() + core.Shared()"));
    }

    #[test]
    fn reports_cycles() {
        let a = "package a\n\nimport \"example.com/m/b\"\n\nvar A = b.B\n";
        let b = "package b\n\nimport \"example.com/m/a\"\n\nvar B = a.A\n";
        let ws = workspace(&[("a/a.go", a), ("b/b.go", b)]);
        let p = plan(&ws, MoveByDependencies::default()).unwrap();
        assert_eq!(
            p.impact.cycles,
            vec![vec!["example.com/m/a".to_string(), "example.com/m/b".to_string()]]
        );
        assert!(p.issues().iter().any(|i| i.kind == IssueKind::ImportCycle));
    }
}
