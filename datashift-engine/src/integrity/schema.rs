//! Schema comparison.
//!
//! The engine only knows that a [`SchemaComparator`] turns two descriptors
//! into a list of differences. [`JsonSchemaComparator`] is the default: a
//! structural diff of the descriptors' JSON forms.

use crate::config::SchemaStrategy;
use crate::error::TransferResult;
use datashift_types::SchemaDescriptor;
use serde::Serialize;
use serde_json::Value;

/// Attribute options whose changes the `strict` strategy tolerates.
const IGNORABLE_ATTRIBUTE_OPTIONS: [&str; 3] = ["private", "required", "configurable"];

/// One structural difference between two JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaDiff {
    /// Present in the destination only.
    Added {
        path: Vec<String>,
        #[serde(rename = "type")]
        value_type: String,
        value: Value,
    },
    /// Present in the source only.
    Deleted {
        path: Vec<String>,
        #[serde(rename = "type")]
        value_type: String,
        value: Value,
    },
    /// Present on both sides with different values.
    Modified {
        path: Vec<String>,
        types: [String; 2],
        values: [Value; 2],
    },
}

impl SchemaDiff {
    pub fn path(&self) -> &[String] {
        match self {
            Self::Added { path, .. } | Self::Deleted { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

/// Compares a source and a destination schema descriptor.
pub trait SchemaComparator: Send + Sync {
    /// Returns the differences that matter under `strategy`. A missing
    /// descriptor means the content type only exists on the other side.
    fn compare(
        &self,
        source: Option<&SchemaDescriptor>,
        destination: Option<&SchemaDescriptor>,
        strategy: SchemaStrategy,
    ) -> TransferResult<Vec<SchemaDiff>>;
}

/// Structural JSON comparison of schema descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaComparator;

impl SchemaComparator for JsonSchemaComparator {
    fn compare(
        &self,
        source: Option<&SchemaDescriptor>,
        destination: Option<&SchemaDescriptor>,
        strategy: SchemaStrategy,
    ) -> TransferResult<Vec<SchemaDiff>> {
        let source = source.map(serde_json::to_value).transpose()?;
        let destination = destination.map(serde_json::to_value).transpose()?;
        let diffs = json_diff(source.as_ref(), destination.as_ref());

        Ok(match strategy {
            SchemaStrategy::Ignore => Vec::new(),
            SchemaStrategy::Exact => diffs,
            SchemaStrategy::Strict => diffs.into_iter().filter(|d| !is_ignorable(d)).collect(),
        })
    }
}

fn is_ignorable(diff: &SchemaDiff) -> bool {
    match diff.path() {
        [root, _, option] => {
            root == "attributes" && IGNORABLE_ATTRIBUTE_OPTIONS.contains(&option.as_str())
        }
        _ => false,
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Structural diff of two optional JSON values.
///
/// Objects are compared key by key and arrays index by index; any other
/// mismatch is reported at the deepest path where the values diverge.
pub fn json_diff(a: Option<&Value>, b: Option<&Value>) -> Vec<SchemaDiff> {
    let mut diffs = Vec::new();
    diff_into(a, b, &mut Vec::new(), &mut diffs);
    diffs
}

fn diff_into(a: Option<&Value>, b: Option<&Value>, path: &mut Vec<String>, out: &mut Vec<SchemaDiff>) {
    match (a, b) {
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for idx in 0..a.len().max(b.len()) {
                path.push(idx.to_string());
                diff_into(a.get(idx), b.get(idx), path, out);
                path.pop();
            }
        }
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys = a.keys().chain(b.keys().filter(|k| !a.contains_key(*k)));
            for key in keys {
                path.push(key.clone());
                diff_into(a.get(key), b.get(key), path, out);
                path.pop();
            }
        }
        (Some(a), Some(b)) if a == b => {}
        (None, None) => {}
        (None, Some(b)) => out.push(SchemaDiff::Added {
            path: path.clone(),
            value_type: type_name(b),
            value: b.clone(),
        }),
        (Some(a), None) => out.push(SchemaDiff::Deleted {
            path: path.clone(),
            value_type: type_name(a),
            value: a.clone(),
        }),
        (Some(a), Some(b)) => out.push(SchemaDiff::Modified {
            path: path.clone(),
            types: [type_name(a), type_name(b)],
            values: [a.clone(), b.clone()],
        }),
    }
}
