use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::ComponentError;

/// Declared type of a workflow parameter (`definition.parameters.<name>.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
  Array,
  Bool,
  Float,
  Int,
  Object,
  SecureObject,
  SecureString,
  String,
}

impl ParameterType {
  const ALL: [ParameterType; 8] = [
    ParameterType::Array,
    ParameterType::Bool,
    ParameterType::Float,
    ParameterType::Int,
    ParameterType::Object,
    ParameterType::SecureObject,
    ParameterType::SecureString,
    ParameterType::String,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ParameterType::Array => "Array",
      ParameterType::Bool => "Bool",
      ParameterType::Float => "Float",
      ParameterType::Int => "Int",
      ParameterType::Object => "Object",
      ParameterType::SecureObject => "SecureObject",
      ParameterType::SecureString => "SecureString",
      ParameterType::String => "String",
    }
  }

  /// Resolve a declared type name, ignoring case.
  pub fn parse(name: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|ty| ty.as_str().eq_ignore_ascii_case(name))
  }

  /// Secure values are write-only: the service never returns them.
  pub fn is_secure(self) -> bool {
    matches!(self, ParameterType::SecureObject | ParameterType::SecureString)
  }
}

impl fmt::Display for ParameterType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

fn declared_type(
  name: &str,
  definitions: &Map<String, Value>,
) -> Result<Option<ParameterType>, ComponentError> {
  let Some(definition) = definitions.get(name) else {
    return Ok(None);
  };
  let declared = definition
    .get("type")
    .and_then(Value::as_str)
    .ok_or_else(|| ComponentError::invalid_parameter(name, "definition has no `type`"))?;

  ParameterType::parse(declared)
    .map(Some)
    .ok_or_else(|| ComponentError::invalid_parameter(name, format!("unsupported type `{declared}`")))
}

/// Type string parameter values according to their definitions.
///
/// Returns the `properties.parameters` map sent to the service. Every value
/// needs a definition.
pub fn expand_parameters(
  values: &BTreeMap<String, String>,
  definitions: &Map<String, Value>,
) -> Result<Map<String, Value>, ComponentError> {
  let mut output = Map::new();

  for (name, raw) in values {
    let ty = declared_type(name, definitions)?
      .ok_or_else(|| ComponentError::invalid_parameter(name, "no parameter definition"))?;

    let typed = match ty {
      ParameterType::Bool => serde_json::from_str::<bool>(raw).map(Value::Bool),
      ParameterType::Float => serde_json::from_str::<f64>(raw).map(Value::from),
      ParameterType::Int => serde_json::from_str::<i64>(raw).map(Value::from),
      ParameterType::Array => serde_json::from_str::<Vec<Value>>(raw).map(Value::Array),
      ParameterType::Object | ParameterType::SecureObject => {
        serde_json::from_str::<Map<String, Value>>(raw).map(Value::Object)
      }
      ParameterType::String | ParameterType::SecureString => Ok(Value::String(raw.clone())),
    };
    let value = typed.map_err(|e| {
      ComponentError::invalid_parameter(name, format!("value is not a valid {ty}: {e}"))
    })?;

    output.insert(name.clone(), json!({ "type": ty.as_str(), "value": value }));
  }

  Ok(output)
}

/// Render typed parameter values back to strings.
///
/// Secure parameters are left out, since the service never returns their
/// values. Parameters without a definition are skipped with a warning.
pub fn flatten_parameters(
  values: &Map<String, Value>,
  definitions: &Map<String, Value>,
) -> Result<BTreeMap<String, String>, ComponentError> {
  let mut output = BTreeMap::new();

  for (name, parameter) in values {
    let Some(ty) = declared_type(name, definitions)? else {
      warn!(parameter = %name, "parameter has no definition in the workflow");
      continue;
    };
    if ty.is_secure() {
      continue;
    }

    let value = parameter.get("value").unwrap_or(&Value::Null);
    let mismatch = || {
      ComponentError::invalid_parameter(
        name,
        format!("expected a {ty} value, got {}", json_kind(value)),
      )
    };

    let flat = match ty {
      ParameterType::Bool => value.as_bool().ok_or_else(mismatch)?.to_string(),
      // JSON has a single number type, so an Int may come back as 3.0.
      ParameterType::Int => match value.as_i64() {
        Some(int) => int.to_string(),
        None => (value.as_f64().ok_or_else(mismatch)? as i64).to_string(),
      },
      ParameterType::Float => value.as_f64().ok_or_else(mismatch)?.to_string(),
      ParameterType::Array if value.is_array() => value.to_string(),
      ParameterType::Object if value.is_object() => value.to_string(),
      ParameterType::String => value.as_str().ok_or_else(mismatch)?.to_string(),
      _ => return Err(mismatch()),
    };

    output.insert(name.clone(), flat);
  }

  Ok(output)
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
