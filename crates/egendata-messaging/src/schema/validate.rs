//! Compiled JSON Schemas and their violation reports.
//!
//! Every error `jsonschema` finds in an instance is reported, with its
//! location rendered as a dotted path (`permissions.approved[0].kid`).

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError, Validator};
use serde::Serialize;
use serde_json::Value;

/// One structural problem found in an instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Violation {
    /// Location in the instance, e.g. `permissions.approved[0].kid`. Empty for the root.
    pub path: String,
    /// The constraint that was not met.
    pub expected: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.expected)
        } else {
            write!(f, "{}: {}", self.path, self.expected)
        }
    }
}

/// A schema document together with its compiled validator.
pub(crate) struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile `schema` as Draft 2020-12 with format assertions on.
    pub(crate) fn compile(schema: Value) -> Result<Self, String> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| e.to_string())?;
        Ok(Self { schema, validator })
    }

    pub(crate) fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate `instance`, collecting every violation sorted by path.
    pub(crate) fn validate(&self, instance: &Value) -> Result<(), Vec<Violation>> {
        if self.validator.is_valid(instance) {
            return Ok(());
        }
        let mut violations: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .flat_map(|e| self.describe(&e, instance))
            .collect();
        violations.sort();
        violations.dedup();
        Err(violations)
    }

    fn describe(&self, error: &ValidationError<'_>, instance: &Value) -> Vec<Violation> {
        let pointer = error.instance_path().to_string();
        let path = dotted(&pointer);

        match error.kind() {
            ValidationErrorKind::Required { property, .. } => {
                vec![Violation::new(join_path(&path, &member(property)), "is required")]
            }
            ValidationErrorKind::AdditionalProperties { unexpected, .. } => unexpected
                .iter()
                .map(|name| Violation::new(join_path(&path, name), "is not allowed"))
                .collect(),
            _ if instance.pointer(&pointer).is_some_and(Value::is_null) => {
                vec![Violation::new(path, "must not be null")]
            }
            ValidationErrorKind::AnyOf { .. } => {
                let expected = match self.alternatives(&error.schema_path().to_string()) {
                    Some(names) => format!("must contain at least one of {names}"),
                    None => error.to_string(),
                };
                vec![Violation::new(path, expected)]
            }
            ValidationErrorKind::OneOfNotValid { .. }
            | ValidationErrorKind::OneOfMultipleValid { .. } => {
                let expected = match self.alternatives(&error.schema_path().to_string()) {
                    Some(names) => format!("must contain exactly one of {names}"),
                    None => error.to_string(),
                };
                vec![Violation::new(path, expected)]
            }
            _ => vec![Violation::new(path, error.to_string())],
        }
    }

    /// Member names of a presence rule (`anyOf`/`oneOf` over `required`).
    fn alternatives(&self, schema_path: &str) -> Option<String> {
        let branches = self.schema.pointer(schema_path)?.as_array()?;
        let names: Vec<&str> = branches
            .iter()
            .filter_map(|branch| branch.pointer("/required/0").and_then(Value::as_str))
            .collect();
        (names.len() == branches.len()).then(|| names.join(", "))
    }
}

fn member(property: &Value) -> String {
    match property.as_str() {
        Some(name) => name.to_string(),
        None => property.to_string(),
    }
}

/// `/permissions/approved/0/kid` -> `permissions.approved[0].kid`.
fn dotted(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            path.push('[');
            path.push_str(&segment);
            path.push(']');
        } else {
            path = join_path(&path, &segment);
        }
    }
    path
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}
