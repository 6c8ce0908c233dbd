use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DocumentError, json_type};
use crate::identity::identity_for_replace;
use crate::kind::ComponentKind;

/// Properties carried over when a document is rebuilt for a replace.
///
/// Everything else under `properties` is computed by the service
/// (`provisioningState`, `createdTime`, `accessEndpoint`, ...) and is dropped.
pub const WRITABLE_PROPERTIES: &[&str] = &[
  "definition",
  "parameters",
  "state",
  "accessControl",
  "integrationAccount",
  "integrationServiceEnvironment",
];

/// A workflow as returned by (or sent to) the remote API.
///
/// The document is kept as an ordered JSON object so fields this crate does
/// not know about survive a read-modify-write unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowDocument(Map<String, Value>);

impl WorkflowDocument {
  /// Create an empty document.
  pub fn new() -> Self {
    Self::default()
  }

  /// Wrap a raw JSON object.
  pub fn from_map(map: Map<String, Value>) -> Self {
    Self(map)
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.0)
  }

  pub fn location(&self) -> Option<&str> {
    self.0.get("location").and_then(Value::as_str)
  }

  pub fn set_location(&mut self, location: impl Into<String>) {
    self
      .0
      .insert("location".to_string(), Value::String(location.into()));
  }

  pub fn tags(&self) -> Option<&Map<String, Value>> {
    self.0.get("tags").and_then(Value::as_object)
  }

  pub fn set_tags(&mut self, tags: Map<String, Value>) {
    self.0.insert("tags".to_string(), Value::Object(tags));
  }

  /// The managed identity block, if the workflow has one.
  pub fn identity(&self) -> Option<&Value> {
    self.0.get("identity").filter(|v| !v.is_null())
  }

  pub fn set_identity(&mut self, identity: Option<Value>) {
    match identity {
      Some(identity) => {
        self.0.insert("identity".to_string(), identity);
      }
      None => {
        self.0.shift_remove("identity");
      }
    }
  }

  pub fn properties(&self) -> Option<&Map<String, Value>> {
    self.0.get("properties").and_then(Value::as_object)
  }

  /// Mutable access to `properties`, creating it when absent.
  pub fn properties_mut(&mut self) -> Result<&mut Map<String, Value>, DocumentError> {
    let slot = self
      .0
      .entry("properties")
      .or_insert_with(|| Value::Object(Map::new()));
    if slot.is_null() {
      *slot = Value::Object(Map::new());
    }
    slot.as_object_mut().ok_or(DocumentError::MissingProperties)
  }

  /// Workflow parameter values (`properties.parameters`).
  pub fn parameters(&self) -> Option<&Map<String, Value>> {
    self
      .properties()
      .and_then(|p| p.get("parameters"))
      .and_then(Value::as_object)
  }

  /// `Enabled` / `Disabled` / ... as reported by the service.
  pub fn state(&self) -> Option<&str> {
    self
      .properties()
      .and_then(|p| p.get("state"))
      .and_then(Value::as_str)
  }

  /// The workflow definition, which must be a JSON object.
  pub fn definition(&self) -> Result<&Map<String, Value>, DocumentError> {
    let properties = self
      .0
      .get("properties")
      .and_then(Value::as_object)
      .ok_or(DocumentError::MissingProperties)?;

    match properties.get("definition") {
      None | Some(Value::Null) => Err(DocumentError::MissingDefinition),
      Some(Value::Object(definition)) => Ok(definition),
      Some(other) => Err(DocumentError::DefinitionNotObject {
        found: json_type(other),
      }),
    }
  }

  pub fn definition_mut(&mut self) -> Result<&mut Map<String, Value>, DocumentError> {
    let properties = self
      .0
      .get_mut("properties")
      .and_then(Value::as_object_mut)
      .ok_or(DocumentError::MissingProperties)?;

    match properties.get_mut("definition") {
      None | Some(Value::Null) => Err(DocumentError::MissingDefinition),
      Some(Value::Object(definition)) => Ok(definition),
      Some(other) => Err(DocumentError::DefinitionNotObject {
        found: json_type(other),
      }),
    }
  }

  /// The component map for `kind`, or `None` when the definition omits it.
  pub fn components(&self, kind: ComponentKind) -> Result<Option<&Map<String, Value>>, DocumentError> {
    let key = kind.definition_key();
    match self.definition()?.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Object(components)) => Ok(Some(components)),
      Some(other) => Err(DocumentError::ComponentsNotObject {
        key,
        found: json_type(other),
      }),
    }
  }

  /// A single component body by name.
  pub fn component(&self, kind: ComponentKind, name: &str) -> Result<Option<&Value>, DocumentError> {
    Ok(self.components(kind)?.and_then(|c| c.get(name)))
  }

  /// Mutable component map for `kind`.
  ///
  /// A workflow with no components of a kind may omit the map entirely; it
  /// is created empty in that case.
  pub fn components_mut(
    &mut self,
    kind: ComponentKind,
  ) -> Result<&mut Map<String, Value>, DocumentError> {
    let key = kind.definition_key();
    let slot = self
      .definition_mut()?
      .entry(key)
      .or_insert_with(|| Value::Object(Map::new()));
    if slot.is_null() {
      *slot = Value::Object(Map::new());
    }

    match slot {
      Value::Object(components) => Ok(components),
      other => Err(DocumentError::ComponentsNotObject {
        key,
        found: json_type(other),
      }),
    }
  }

  /// Remove a component, returning its body if it was present.
  pub fn remove_component(
    &mut self,
    kind: ComponentKind,
    name: &str,
  ) -> Result<Option<Value>, DocumentError> {
    let key = kind.definition_key();
    match self.definition_mut()?.get_mut(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Object(components)) => Ok(components.shift_remove(name)),
      Some(other) => Err(DocumentError::ComponentsNotObject {
        key,
        found: json_type(other),
      }),
    }
  }

  /// Build the document to send on a whole-document replace.
  ///
  /// Keeps `location`, `tags`, `identity` and the writable properties exactly
  /// as they are in `self`. The identity goes through
  /// [`identity_for_replace`].
  pub fn replacement(&self) -> WorkflowDocument {
    let mut output = Map::new();

    if let Some(location) = self.0.get("location").filter(|v| !v.is_null()) {
      output.insert("location".to_string(), location.clone());
    }
    if let Some(tags) = self.0.get("tags").filter(|v| !v.is_null()) {
      output.insert("tags".to_string(), tags.clone());
    }
    if let Some(identity) = self.identity() {
      output.insert("identity".to_string(), identity_for_replace(identity));
    }

    let mut properties = Map::new();
    if let Some(source) = self.properties() {
      for key in WRITABLE_PROPERTIES {
        if let Some(value) = source.get(*key).filter(|v| !v.is_null()) {
          properties.insert((*key).to_string(), value.clone());
        }
      }
    }
    output.insert("properties".to_string(), Value::Object(properties));

    WorkflowDocument(output)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn document(value: Value) -> WorkflowDocument {
    serde_json::from_value(value).expect("document should deserialize")
  }

  fn sample() -> WorkflowDocument {
    document(json!({
      "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Logic/workflows/wf1",
      "name": "wf1",
      "type": "Microsoft.Logic/workflows",
      "location": "westeurope",
      "tags": { "env": "test" },
      "properties": {
        "provisioningState": "Succeeded",
        "createdTime": "2024-01-01T00:00:00Z",
        "state": "Enabled",
        "definition": {
          "$schema": "https://schema.management.azure.com/providers/Microsoft.Logic/schemas/2016-06-01/workflowdefinition.json#",
          "contentVersion": "1.0.0.0",
          "parameters": { "p1": { "type": "String" } },
          "actions": {},
          "triggers": {},
          "outputs": { "kept": true }
        },
        "parameters": { "p1": { "type": "String", "value": "v" } }
      }
    }))
  }

  #[test]
  fn test_non_object_document_is_rejected() {
    let result: Result<WorkflowDocument, _> = serde_json::from_value(json!([1, 2]));
    assert!(result.is_err());
  }

  #[test]
  fn test_definition_missing() {
    let doc = document(json!({ "properties": { "state": "Enabled" } }));
    assert_eq!(doc.definition(), Err(DocumentError::MissingDefinition));

    let doc = document(json!({ "properties": { "definition": null } }));
    assert_eq!(doc.definition(), Err(DocumentError::MissingDefinition));

    let doc = document(json!({ "location": "westeurope" }));
    assert_eq!(doc.definition(), Err(DocumentError::MissingProperties));
  }

  #[test]
  fn test_definition_not_object() {
    let mut doc = document(json!({ "properties": { "definition": "nope" } }));
    assert_eq!(
      doc.definition(),
      Err(DocumentError::DefinitionNotObject { found: "string" })
    );
    assert_eq!(
      doc.components_mut(ComponentKind::Action).map(|_| ()),
      Err(DocumentError::DefinitionNotObject { found: "string" })
    );
  }

  #[test]
  fn test_components_mut_creates_missing_map() {
    let mut doc = document(json!({ "properties": { "definition": { "contentVersion": "1.0.0.0" } } }));
    assert_eq!(doc.components(ComponentKind::Trigger), Ok(None));

    doc
      .components_mut(ComponentKind::Trigger)
      .expect("definition is valid")
      .insert("t1".to_string(), json!({ "type": "Request" }));

    assert_eq!(
      doc.component(ComponentKind::Trigger, "t1"),
      Ok(Some(&json!({ "type": "Request" })))
    );
    assert_eq!(
      doc.definition().expect("definition is valid").get("contentVersion"),
      Some(&json!("1.0.0.0"))
    );
  }

  #[test]
  fn test_components_not_object() {
    let mut doc = document(json!({ "properties": { "definition": { "actions": [] } } }));
    let expected = DocumentError::ComponentsNotObject {
      key: "actions",
      found: "array",
    };

    assert_eq!(doc.components(ComponentKind::Action), Err(expected.clone()));
    assert_eq!(
      doc.remove_component(ComponentKind::Action, "a1"),
      Err(expected)
    );
    // The other kind is unaffected.
    assert_eq!(doc.components(ComponentKind::Trigger), Ok(None));
  }

  #[test]
  fn test_remove_component_keeps_order() {
    let mut doc = document(json!({
      "properties": { "definition": { "actions": { "a": 1, "b": 2, "c": 3 } } }
    }));

    let removed = doc
      .remove_component(ComponentKind::Action, "a")
      .expect("definition is valid");
    assert_eq!(removed, Some(json!(1)));

    let keys: Vec<&String> = doc
      .components(ComponentKind::Action)
      .expect("definition is valid")
      .expect("actions present")
      .keys()
      .collect();
    assert_eq!(keys, ["b", "c"]);

    assert_eq!(doc.remove_component(ComponentKind::Action, "zzz"), Ok(None));
  }

  #[test]
  fn test_replacement_keeps_writable_fields_only() {
    let replacement = sample().replacement();

    assert_eq!(
      replacement.into_value(),
      json!({
        "location": "westeurope",
        "tags": { "env": "test" },
        "properties": {
          "definition": {
            "$schema": "https://schema.management.azure.com/providers/Microsoft.Logic/schemas/2016-06-01/workflowdefinition.json#",
            "contentVersion": "1.0.0.0",
            "parameters": { "p1": { "type": "String" } },
            "actions": {},
            "triggers": {},
            "outputs": { "kept": true }
          },
          "parameters": { "p1": { "type": "String", "value": "v" } },
          "state": "Enabled"
        }
      })
    );
  }

  #[test]
  fn test_replacement_clears_identity_values() {
    let mut doc = sample();
    doc.set_identity(Some(json!({
      "type": "UserAssigned",
      "userAssignedIdentities": { "k1": { "principalId": "p" }, "k2": { "clientId": "c" } }
    })));

    let replacement = doc.replacement();

    assert_eq!(
      replacement.identity(),
      Some(&json!({
        "type": "UserAssigned",
        "userAssignedIdentities": { "k1": {}, "k2": {} }
      }))
    );
  }

  #[test]
  fn test_envelope_accessors() {
    let mut doc = sample();
    assert_eq!(doc.location(), Some("westeurope"));
    assert_eq!(doc.state(), Some("Enabled"));
    assert_eq!(doc.tags().map(|t| t.len()), Some(1));
    assert!(doc.identity().is_none());

    doc.set_location("northeurope");
    doc.set_identity(Some(json!({ "type": "SystemAssigned" })));
    assert_eq!(doc.location(), Some("northeurope"));
    assert!(doc.identity().is_some());

    doc.set_identity(None);
    assert!(doc.identity().is_none());
  }
}
