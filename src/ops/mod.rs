//! Refactoring operations.
//!
//! Every refactoring implements [`Operation`]: it validates its request
//! against an immutable [`Workspace`] snapshot and then produces a [`Plan`]
//! of byte-level changes. Operations read the workspace and the shared
//! [`ReferenceIndex`] only; nothing is written until the plan is applied.

pub mod aliases;
pub mod common;
pub mod deps;
pub mod extract;
pub mod facade;
pub mod inline;
pub mod moves;
pub mod rename;
pub mod signature;
pub mod transplant;

pub use aliases::{CleanAliases, ConvertToAliases, ResolveAliasConflicts, StandardizeAliases};
pub use deps::MoveByDependencies;
pub use extract::{
    ExtractConstant, ExtractFunction, ExtractInterface, ExtractMethod, ExtractVariable,
};
pub use facade::{CreateFacade, GenerateFacades, UpdateFacade};
pub use inline::{InlineConstant, InlineFunction, InlineMethod, InlineVariable};
pub use moves::{MoveDirectory, MovePackage, MoveSymbol};
pub use rename::{RenameInterfaceMethod, RenameMethod, RenamePackage, RenameSymbol};
pub use signature::ChangeSignature;

use crate::error::RefactorError;
use crate::plan::Plan;
use crate::resolve::{ReferenceIndex, Resolver};
use crate::workspace::{PackageId, Workspace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Read-only inputs shared by the operations of one planner invocation.
pub struct Context<'a> {
    pub ws: &'a Workspace,
    pub index: &'a ReferenceIndex,
    resolver: Resolver<'a>,
}

impl<'a> Context<'a> {
    pub fn new(ws: &'a Workspace, index: &'a ReferenceIndex) -> Self {
        Self {
            ws,
            index,
            resolver: Resolver::new(ws),
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn package(&self, spec: &str) -> Result<PackageId, RefactorError> {
        self.resolver.package(spec)
    }
}

/// The contract every refactoring fulfils.
pub trait Operation {
    fn kind(&self) -> OperationKind;

    /// One-line human description.
    fn describe(&self) -> String;

    /// Check preconditions without producing changes.
    fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError>;

    /// Produce the plan. Callers run [`Operation::validate`] first.
    fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError>;
}

/// Where a rename or rewrite looks for sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Package,
    Workspace,
}

impl FromStr for Scope {
    type Err = RefactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "package" => Ok(Scope::Package),
            "workspace" => Ok(Scope::Workspace),
            other => Err(RefactorError::invalid(format!(
                "unknown scope '{other}' (expected package or workspace)"
            ))),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Package => "package",
            Scope::Workspace => "workspace",
        })
    }
}

macro_rules! operations {
    ($($variant:ident => $tag:literal,)*) => {
        /// Tag of every operation variant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum OperationKind {
            $($variant,)*
        }

        impl OperationKind {
            pub const ALL: &'static [OperationKind] = &[$(OperationKind::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(OperationKind::$variant => $tag,)*
                }
            }
        }

        impl FromStr for OperationKind {
            type Err = RefactorError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(OperationKind::$variant),)*
                    other => Err(RefactorError::invalid(format!("unknown operation type '{other}'"))),
                }
            }
        }

        /// Closed set of operation variants.
        #[derive(Debug, Clone)]
        pub enum AnyOperation {
            $($variant($variant),)*
        }

        impl Operation for AnyOperation {
            fn kind(&self) -> OperationKind {
                match self {
                    $(AnyOperation::$variant(op) => op.kind(),)*
                }
            }

            fn describe(&self) -> String {
                match self {
                    $(AnyOperation::$variant(op) => op.describe(),)*
                }
            }

            fn validate(&self, cx: &Context<'_>) -> Result<(), RefactorError> {
                match self {
                    $(AnyOperation::$variant(op) => op.validate(cx),)*
                }
            }

            fn execute(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
                match self {
                    $(AnyOperation::$variant(op) => op.execute(cx),)*
                }
            }
        }

        impl AnyOperation {
            /// Field map of the wrapped operation.
            pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
                match self {
                    $(AnyOperation::$variant(op) => serde_json::to_value(op),)*
                }
            }

            /// Build the variant tagged `kind` from any serde source.
            pub fn deserialize_as<'de, D>(kind: OperationKind, de: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                match kind {
                    $(OperationKind::$variant => {
                        <$variant as Deserialize>::deserialize(de).map(AnyOperation::$variant)
                    })*
                }
            }
        }

        $(
            impl From<$variant> for AnyOperation {
                fn from(op: $variant) -> Self {
                    AnyOperation::$variant(op)
                }
            }
        )*
    };
}

operations! {
    RenameSymbol => "rename_symbol",
    RenameMethod => "rename_method",
    RenameInterfaceMethod => "rename_interface_method",
    RenamePackage => "rename_package",
    MoveSymbol => "move_symbol",
    MovePackage => "move_package",
    MoveDirectory => "move_directory",
    ExtractFunction => "extract_function",
    ExtractMethod => "extract_method",
    ExtractInterface => "extract_interface",
    ExtractVariable => "extract_variable",
    ExtractConstant => "extract_constant",
    InlineFunction => "inline_function",
    InlineMethod => "inline_method",
    InlineVariable => "inline_variable",
    InlineConstant => "inline_constant",
    ChangeSignature => "change_signature",
    CleanAliases => "clean_aliases",
    StandardizeAliases => "standardize_aliases",
    ResolveAliasConflicts => "resolve_alias_conflicts",
    ConvertToAliases => "convert_to_aliases",
    CreateFacade => "create_facade",
    GenerateFacades => "generate_facades",
    UpdateFacade => "update_facade",
    MoveByDependencies => "move_by_dependencies",
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnyOperation {
    /// Validate then execute.
    pub fn plan(&self, cx: &Context<'_>) -> Result<Plan, RefactorError> {
        self.validate(cx)?;
        self.execute(cx)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::collections::BTreeMap;

    pub const MODULE: &str = "example.com/m";

    pub fn workspace(files: &[(&str, &str)]) -> Workspace {
        Workspace::from_sources("/ws", Some(MODULE), files).unwrap()
    }

    pub fn plan(ws: &Workspace, op: impl Into<AnyOperation>) -> Result<Plan, RefactorError> {
        let index = ReferenceIndex::build(ws);
        let cx = Context::new(ws, &index);
        op.into().plan(&cx)
    }

    /// Post-apply text of every affected file, keyed by path.
    pub fn applied(ws: &Workspace, plan: &Plan) -> BTreeMap<String, String> {
        crate::plan::apply_in_memory(plan, ws)
            .unwrap()
            .into_iter()
            .map(|(path, text)| (path.to_string_lossy().into_owned(), text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_tags() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), *kind);
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(OperationKind::ALL.len(), 25);
        assert!("explode".parse::<OperationKind>().is_err());
    }

    #[test]
    fn scope_parses() {
        assert_eq!("workspace".parse::<Scope>().unwrap(), Scope::Workspace);
        assert!("galaxy".parse::<Scope>().is_err());
    }
}
