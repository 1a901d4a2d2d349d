//! The repaired agreement document.

use serde_json::Value;

use articulate_shared::{ArticulateError, Result};

/// Dotted path of the articulation list inside an agreement document.
pub const ARTICULATIONS_PATH: &str = "result.articulations";

/// A structurally valid agreement document produced by [`crate::repair`].
///
/// Field access beyond the articulation list is left to the walker, which
/// treats every missing or mistyped field as "nothing to extract".
#[derive(Debug, Clone, PartialEq)]
pub struct ArticulationDocument {
    root: Value,
}

impl ArticulationDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// The top-level articulation nodes.
    ///
    /// Fails with [`ArticulateError::SchemaMismatch`] when the list is absent
    /// or is not an array, since either means the upstream contract changed.
    pub fn articulations(&self) -> Result<&[Value]> {
        let list = self
            .root
            .get("result")
            .and_then(|result| result.get("articulations"))
            .ok_or_else(|| ArticulateError::schema_mismatch(ARTICULATIONS_PATH, "path not found"))?;

        list.as_array().map(Vec::as_slice).ok_or_else(|| {
            ArticulateError::schema_mismatch(
                ARTICULATIONS_PATH,
                format!("expected an array, found {}", value_kind(list)),
            )
        })
    }
}

impl From<Value> for ArticulationDocument {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
