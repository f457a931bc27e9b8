//! Instance validation backed by the `jsonschema` crate.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CheckError;

/// Keywords whose failure means "none of the alternatives matched".
const COMBINATORS: &[&str] = &["anyOf", "oneOf"];

/// Keywords carried from the root schema into a branch validated on its own,
/// so that local `$ref`s keep resolving.
const SHARED_KEYWORDS: &[&str] = &["$schema", "$defs", "definitions"];

/// One schema failure with an optional list of alternative sub-causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// JSON Pointer (RFC 6901) to the failing location in the instance.
    pub pointer: String,
    pub message: String,
    /// One entry per rejected alternative of an `anyOf`/`oneOf`, each holding
    /// the messages that branch produced.
    pub alternatives: Vec<Vec<String>>,
}

impl Failure {
    pub fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.into(),
            alternatives: Vec::new(),
        }
    }

    /// Message followed by each alternative's sub-messages, one per line,
    /// with alternatives separated by an `or` line.
    pub fn render(&self) -> String {
        let mut out = self.message.clone();
        for (i, alternative) in self.alternatives.iter().enumerate() {
            if i > 0 {
                out.push_str("\nor");
            }
            for message in alternative {
                out.push_str("\n\t");
                out.push_str(message);
            }
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pointer, self.render())
    }
}

/// Validate `instance` against `schema`.
///
/// Returns the failures in the order the validator reports them; an empty
/// list means the instance is valid.
///
/// # Errors
///
/// Returns `CheckError::InvalidSchema` if the schema cannot be compiled.
pub fn validate_against_schema(
    schema_name: &str,
    schema: &Value,
    instance: &Value,
) -> Result<Vec<Failure>, CheckError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| CheckError::InvalidSchema {
        schema: schema_name.to_string(),
        message: e.to_string(),
    })?;

    let failures = validator
        .iter_errors(instance)
        .map(|e| {
            let pointer = e.instance_path.to_string();
            let schema_path = e.schema_path.to_string();
            let mut failure = Failure::new(pointer, e.to_string());
            if is_combinator(&schema_path) {
                failure.alternatives = alternatives(schema, &schema_path, instance, &failure.pointer);
            }
            failure
        })
        .collect();

    Ok(failures)
}

fn is_combinator(schema_path: &str) -> bool {
    schema_path
        .rsplit('/')
        .next()
        .map(|keyword| COMBINATORS.contains(&keyword))
        .unwrap_or(false)
}

/// Messages of every branch of the combinator at `schema_path` that rejects
/// the instance value at `pointer`.
///
/// Paths that go through a `$ref` cannot be followed in the raw schema; those
/// failures keep their top-level message only.
fn alternatives(
    root: &Value,
    schema_path: &str,
    instance: &Value,
    pointer: &str,
) -> Vec<Vec<String>> {
    let (Some(Value::Array(branches)), Some(value)) =
        (root.pointer(schema_path), instance.pointer(pointer))
    else {
        debug!(schema_path, "combinator branches not reachable");
        return Vec::new();
    };

    branches
        .iter()
        .filter_map(|branch| {
            let branch = standalone_branch(root, branch);
            let validator = match jsonschema::validator_for(&branch) {
                Ok(v) => v,
                Err(e) => {
                    debug!(schema_path, error = %e, "cannot compile combinator branch");
                    return None;
                }
            };
            let messages: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
            (!messages.is_empty()).then_some(messages)
        })
        .collect()
}

fn standalone_branch(root: &Value, branch: &Value) -> Value {
    let Value::Object(branch_map) = branch else {
        return branch.clone();
    };
    let mut merged: Map<String, Value> = branch_map.clone();
    for &keyword in SHARED_KEYWORDS {
        if let Some(shared) = root.get(keyword) {
            merged
                .entry(keyword.to_string())
                .or_insert_with(|| shared.clone());
        }
    }
    Value::Object(merged)
}
