//! Plan documents: a batch of operation requests saved as JSON so it can be
//! reviewed, versioned and replayed.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "workspace": "/src/app",
//!   "steps": [
//!     { "type": "rename_symbol", "args": { "symbol": "Foo", "new_name": "Bar", "package": "a" } }
//!   ],
//!   "dry_run": false
//! }
//! ```
//!
//! Step arguments are flat string maps. Flags read `true`/`false`, numbers
//! are decimal, and lists are comma-separated (or a JSON array when an
//! element itself contains a comma).

use crate::ops::{AnyOperation, Operation, OperationKind};
use chrono::{DateTime, SecondsFormat, Utc};
use semver::{Version, VersionReq};
use serde::de::value::{Error as ArgError, MapDeserializer, SeqDeserializer, StrDeserializer};
use serde::de::{self, IntoDeserializer, Visitor};
use serde::{forward_to_deserialize_any, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Version written into new documents.
pub const PLAN_FORMAT_VERSION: &str = "1.0";

/// Document versions this build reads.
const SUPPORTED_VERSIONS: &str = "^1";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("cannot access plan file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed plan document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported plan version '{found}' (expected ^1)")]
    Version { found: String },

    #[error("invalid created_at timestamp '{0}'")]
    Timestamp(String),

    #[error("unknown step type '{0}'")]
    UnknownStep(String),

    #[error("step {index} ({kind}): {message}")]
    Args {
        index: usize,
        kind: String,
        message: String,
    },
}

/// One persisted operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl PlanStep {
    pub fn from_operation(op: &AnyOperation) -> Result<Self, PersistError> {
        let Value::Object(fields) = op.to_value()? else {
            return Err(PersistError::Args {
                index: 0,
                kind: op.kind().to_string(),
                message: "operation does not serialize to a field map".into(),
            });
        };
        let mut args = BTreeMap::new();
        for (key, value) in fields {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Array(items) => encode_list(items),
                other => other.to_string(),
            };
            args.insert(key, text);
        }
        Ok(Self {
            kind: op.kind().to_string(),
            args,
        })
    }

    /// Decode the step; `index` only labels errors.
    pub fn to_operation(&self, index: usize) -> Result<AnyOperation, PersistError> {
        let kind: OperationKind = self
            .kind
            .parse()
            .map_err(|_| PersistError::UnknownStep(self.kind.clone()))?;
        AnyOperation::deserialize_as(kind, ArgsDeserializer { args: &self.args }).map_err(|e| {
            PersistError::Args {
                index: index + 1,
                kind: self.kind.clone(),
                message: e.to_string(),
            }
        })
    }
}

fn encode_list(items: Vec<Value>) -> String {
    let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
    match strings {
        Some(list) if list.iter().all(|s| !s.contains(',')) => list.join(","),
        _ => Value::Array(items).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub version: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub workspace: PathBuf,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub dry_run: bool,
}

impl PlanDocument {
    pub fn new(workspace: impl Into<PathBuf>, steps: Vec<PlanStep>, dry_run: bool) -> Self {
        Self {
            version: PLAN_FORMAT_VERSION.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            workspace: workspace.into(),
            steps,
            dry_run,
        }
    }

    pub fn from_operations(
        workspace: impl Into<PathBuf>,
        ops: &[AnyOperation],
        dry_run: bool,
    ) -> Result<Self, PersistError> {
        let steps = ops
            .iter()
            .map(PlanStep::from_operation)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(workspace, steps, dry_run))
    }

    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        let doc: PlanDocument = serde_json::from_str(text)?;
        doc.check()?;
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let text = fs::read_to_string(path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Self::from_json(&text)?;
        debug!(path = %path.display(), steps = doc.steps.len(), "plan document loaded");
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let mut text = self.to_json()?;
        text.push('\n');
        fs::write(path, text).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>, PersistError> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| PersistError::Timestamp(self.created_at.clone()))
    }

    /// Decode every step; the first bad step fails the document.
    pub fn operations(&self) -> Result<Vec<AnyOperation>, PersistError> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| step.to_operation(i))
            .collect()
    }

    fn check(&self) -> Result<(), PersistError> {
        let unsupported = || PersistError::Version {
            found: self.version.clone(),
        };
        // Documents carry "major.minor"; semver wants three parts.
        let mut padded = self.version.clone();
        while padded.matches('.').count() < 2 {
            padded.push_str(".0");
        }
        let version = Version::parse(&padded).map_err(|_| unsupported())?;
        let req = VersionReq::parse(SUPPORTED_VERSIONS).map_err(|_| unsupported())?;
        if !req.matches(&version) {
            return Err(unsupported());
        }
        self.created_at()?;
        Ok(())
    }
}

/// Reads an operation struct out of a flat string map.
struct ArgsDeserializer<'a> {
    args: &'a BTreeMap<String, String>,
}

impl<'de, 'a> de::Deserializer<'de> for ArgsDeserializer<'a> {
    type Error = ArgError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        let entries = self
            .args
            .iter()
            .map(|(k, v)| (k.as_str(), ArgValue(v.as_str())));
        visitor.visit_map(MapDeserializer::new(entries))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

/// One argument value, parsed according to the field it lands in.
struct ArgValue<'a>(&'a str);

impl<'de, 'a> IntoDeserializer<'de, ArgError> for ArgValue<'a> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

impl<'a> ArgValue<'a> {
    fn parse<T: std::str::FromStr>(&self, what: &str) -> Result<T, ArgError> {
        self.0
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected {what}, found '{}'", self.0)))
    }
}

impl<'de, 'a> de::Deserializer<'de> for ArgValue<'a> {
    type Error = ArgError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_str(self.0)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_bool(self.parse("true or false")?)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_u8(self.parse("u8")?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_u16(self.parse("u16")?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_u32(self.parse("u32")?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_u64(self.parse("u64")?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_i32(self.parse("i32")?)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        visitor.visit_i64(self.parse("i64")?)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        if self.0.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ArgError> {
        let text = self.0.trim();
        let items: Vec<String> = if text.starts_with('[') {
            serde_json::from_str(text).map_err(de::Error::custom)?
        } else {
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };
        visitor.visit_seq(SeqDeserializer::new(items.into_iter()))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ArgError> {
        let de: StrDeserializer<'_, ArgError> = self.0.into_deserializer();
        visitor.visit_enum(de)
    }

    forward_to_deserialize_any! {
        i8 i16 i128 u128 f32 f64 char str string bytes byte_buf unit unit_struct
        newtype_struct tuple tuple_struct map struct identifier ignored_any
    }
}
