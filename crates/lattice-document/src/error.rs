use serde_json::Value;
use thiserror::Error;

/// Ways a workflow document can fail to have the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
  /// `properties` is absent or is not an object.
  #[error("`properties` is missing or not an object")]
  MissingProperties,

  /// `properties.definition` is absent or null.
  #[error("`properties.definition` is missing")]
  MissingDefinition,

  /// `properties.definition` is present but is not an object.
  #[error("`properties.definition` is not an object (found {found})")]
  DefinitionNotObject { found: &'static str },

  /// The `actions` or `triggers` map is present but is not an object.
  #[error("`{key}` in the workflow definition is not an object (found {found})")]
  ComponentsNotObject { key: &'static str, found: &'static str },
}

/// Name of the JSON type of a value, for error messages.
pub(crate) fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
