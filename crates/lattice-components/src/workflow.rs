use std::collections::BTreeMap;
use std::sync::Arc;

use lattice_client::WorkflowClient;
use lattice_document::{DocumentError, WorkflowDocument};
use lattice_locks::NamedLocks;
use lattice_resource_id::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ComponentError;
use crate::parameters::{expand_parameters, flatten_parameters};
use crate::rmw;

/// Definition language schema written into new workflows.
pub const DEFAULT_SCHEMA: &str =
  "https://schema.management.azure.com/providers/Microsoft.Logic/schemas/2016-06-01/workflowdefinition.json#";

/// Definition content version written into new workflows.
pub const DEFAULT_CONTENT_VERSION: &str = "1.0.0.0";

const ACCESS_CONTROL: &str = "accessControl";
const INTEGRATION_ACCOUNT: &str = "integrationAccount";
const INTEGRATION_SERVICE_ENVIRONMENT: &str = "integrationServiceEnvironment";

fn default_enabled() -> bool {
  true
}

fn default_schema() -> String {
  DEFAULT_SCHEMA.to_string()
}

fn default_content_version() -> String {
  DEFAULT_CONTENT_VERSION.to_string()
}

/// The workflow-level settings a caller manages.
///
/// Actions and triggers are not part of the settings: they are managed one at a
/// time through [`ComponentStore`](crate::ComponentStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
  pub location: String,

  #[serde(default)]
  pub tags: BTreeMap<String, String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub identity: Option<Value>,

  #[serde(default = "default_enabled")]
  pub enabled: bool,

  /// `$schema` of the definition. Only used when the workflow is created.
  #[serde(default = "default_schema")]
  pub schema: String,

  /// `contentVersion` of the definition. Only used when the workflow is created.
  #[serde(default = "default_content_version")]
  pub content_version: String,

  /// `definition.parameters`: name to parameter definition.
  #[serde(default)]
  pub parameter_definitions: Map<String, Value>,

  /// Parameter values, typed through `parameter_definitions` on write.
  #[serde(default)]
  pub parameters: BTreeMap<String, String>,

  /// `properties.accessControl`, passed through as-is.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub access_control: Option<Value>,

  /// Resource id of the linked integration account.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub integration_account_id: Option<String>,

  /// Resource id of the integration service environment the workflow runs in.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub integration_service_environment_id: Option<String>,
}

impl WorkflowSettings {
  pub fn new(location: impl Into<String>) -> Self {
    Self {
      location: location.into(),
      tags: BTreeMap::new(),
      identity: None,
      enabled: true,
      schema: default_schema(),
      content_version: default_content_version(),
      parameter_definitions: Map::new(),
      parameters: BTreeMap::new(),
      access_control: None,
      integration_account_id: None,
      integration_service_environment_id: None,
    }
  }

  /// Read the settings back from a stored document.
  pub fn from_document(
    workflow: &WorkflowId,
    document: &WorkflowDocument,
  ) -> Result<Self, ComponentError> {
    let definition = document.definition().map_err(|e| malformed(workflow, e))?;

    let parameter_definitions = definition
      .get("parameters")
      .and_then(Value::as_object)
      .cloned()
      .unwrap_or_default();
    let parameters = match document.parameters() {
      Some(values) => flatten_parameters(values, &parameter_definitions)?,
      None => BTreeMap::new(),
    };

    let tags = document
      .tags()
      .map(|tags| {
        tags
          .iter()
          .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
          .collect()
      })
      .unwrap_or_default();

    Ok(Self {
      location: document.location().unwrap_or_default().to_string(),
      tags,
      identity: document.identity().cloned(),
      enabled: document
        .state()
        .is_none_or(|state| state.eq_ignore_ascii_case("Enabled")),
      schema: definition
        .get("$schema")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SCHEMA)
        .to_string(),
      content_version: definition
        .get("contentVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CONTENT_VERSION)
        .to_string(),
      parameter_definitions,
      parameters,
      access_control: document
        .properties()
        .and_then(|p| p.get(ACCESS_CONTROL))
        .filter(|v| !v.is_null())
        .cloned(),
      integration_account_id: linked_id(document, INTEGRATION_ACCOUNT),
      integration_service_environment_id: linked_id(document, INTEGRATION_SERVICE_ENVIRONMENT),
    })
  }

  fn state(&self) -> &'static str {
    if self.enabled { "Enabled" } else { "Disabled" }
  }

  fn tag_map(&self) -> Map<String, Value> {
    self
      .tags
      .iter()
      .map(|(k, v)| (k.clone(), Value::String(v.clone())))
      .collect()
  }

  /// Set or clear access control and the linked resource references.
  fn write_linked(&self, properties: &mut Map<String, Value>) {
    let linked = [
      (ACCESS_CONTROL, self.access_control.clone()),
      (
        INTEGRATION_ACCOUNT,
        self.integration_account_id.as_deref().map(reference),
      ),
      (
        INTEGRATION_SERVICE_ENVIRONMENT,
        self.integration_service_environment_id.as_deref().map(reference),
      ),
    ];

    for (key, value) in linked {
      match value {
        Some(value) => {
          properties.insert(key.to_string(), value);
        }
        None => {
          properties.shift_remove(key);
        }
      }
    }
  }

  /// A brand-new document with no actions and no triggers.
  fn to_document(&self) -> Result<WorkflowDocument, ComponentError> {
    let parameters = expand_parameters(&self.parameters, &self.parameter_definitions)?;

    let mut definition = Map::new();
    definition.insert("$schema".to_string(), Value::String(self.schema.clone()));
    definition.insert(
      "contentVersion".to_string(),
      Value::String(self.content_version.clone()),
    );
    definition.insert(
      "parameters".to_string(),
      Value::Object(self.parameter_definitions.clone()),
    );
    definition.insert("actions".to_string(), Value::Object(Map::new()));
    definition.insert("triggers".to_string(), Value::Object(Map::new()));

    let mut properties = Map::new();
    properties.insert("definition".to_string(), Value::Object(definition));
    properties.insert("parameters".to_string(), Value::Object(parameters));
    properties.insert("state".to_string(), Value::String(self.state().to_string()));
    self.write_linked(&mut properties);

    let mut map = Map::new();
    map.insert("location".to_string(), Value::String(self.location.clone()));
    map.insert("tags".to_string(), Value::Object(self.tag_map()));
    if let Some(identity) = &self.identity {
      map.insert("identity".to_string(), identity.clone());
    }
    map.insert("properties".to_string(), Value::Object(properties));
    Ok(WorkflowDocument::from_map(map))
  }

  /// Overwrite the managed settings of an existing document, leaving its
  /// actions and triggers alone.
  fn apply_to(
    &self,
    workflow: &WorkflowId,
    document: &mut WorkflowDocument,
  ) -> Result<(), ComponentError> {
    let parameters = expand_parameters(&self.parameters, &self.parameter_definitions)?;

    document
      .definition_mut()
      .map_err(|e| malformed(workflow, e))?
      .insert(
        "parameters".to_string(),
        Value::Object(self.parameter_definitions.clone()),
      );

    let properties = document.properties_mut().map_err(|e| malformed(workflow, e))?;
    properties.insert("parameters".to_string(), Value::Object(parameters));
    properties.insert("state".to_string(), Value::String(self.state().to_string()));
    self.write_linked(properties);

    document.set_location(&self.location);
    document.set_tags(self.tag_map());
    document.set_identity(self.identity.clone());
    Ok(())
  }
}

/// `{"id": ...}` as the service expects for a linked resource.
fn reference(id: &str) -> Value {
  let mut map = Map::new();
  map.insert("id".to_string(), Value::String(id.to_string()));
  Value::Object(map)
}

fn linked_id(document: &WorkflowDocument, key: &str) -> Option<String> {
  document
    .properties()?
    .get(key)?
    .get("id")?
    .as_str()
    .map(str::to_string)
}

fn malformed(workflow: &WorkflowId, source: DocumentError) -> ComponentError {
  ComponentError::MalformedDocument {
    workflow: workflow.clone(),
    source,
  }
}

/// Manages the parent workflows that components live in.
///
/// Uses the same lock namespace as [`ComponentStore`](crate::ComponentStore),
/// so a settings update never races a component write on the same workflow.
pub struct WorkflowStore<C> {
  client: C,
  locks: Arc<NamedLocks>,
}

impl<C: WorkflowClient> WorkflowStore<C> {
  /// Create a store that uses the process-wide lock registry.
  pub fn new(client: C) -> Self {
    Self::with_locks(client, NamedLocks::shared())
  }

  pub fn with_locks(client: C, locks: Arc<NamedLocks>) -> Self {
    Self { client, locks }
  }

  pub fn client(&self) -> &C {
    &self.client
  }

  /// Create a workflow with no actions and no triggers.
  ///
  /// Fails with [`AlreadyExists`](ComponentError::AlreadyExists) if the
  /// workflow is already there.
  #[instrument(
    name = "workflow_create",
    skip(self, id, settings, cancel),
    fields(workflow = %id.workflow_name)
  )]
  pub async fn create(
    &self,
    id: &WorkflowId,
    settings: &WorkflowSettings,
    cancel: CancellationToken,
  ) -> Result<WorkflowId, ComponentError> {
    let document = settings.to_document()?;
    let _guard = rmw::lock(&self.locks, id, &cancel).await?;

    let existing = rmw::fetch(&self.client, id, || "to create it".to_string(), &cancel).await?;
    if existing.is_some() {
      warn!("workflow already exists");
      return Err(ComponentError::AlreadyExists {
        id: id.to_string(),
      });
    }

    rmw::replace(
      &self.client,
      id,
      &document.replacement(),
      || format!("creating workflow {id}"),
      &cancel,
    )
    .await?;

    info!(location = %settings.location, "workflow created");
    Ok(id.clone())
  }

  /// Current settings, or `None` if the workflow does not exist.
  #[instrument(
    name = "workflow_read",
    skip(self, id, cancel),
    fields(workflow = %id.workflow_name)
  )]
  pub async fn read(
    &self,
    id: &WorkflowId,
    cancel: CancellationToken,
  ) -> Result<Option<WorkflowSettings>, ComponentError> {
    let _guard = rmw::lock(&self.locks, id, &cancel).await?;

    let fetched = rmw::fetch(&self.client, id, || "to read its settings".to_string(), &cancel).await?;
    match fetched {
      Some(document) => WorkflowSettings::from_document(id, &document).map(Some),
      None => Ok(None),
    }
  }

  /// Replace the managed settings of an existing workflow.
  #[instrument(
    name = "workflow_update",
    skip(self, id, settings, cancel),
    fields(workflow = %id.workflow_name)
  )]
  pub async fn update_settings(
    &self,
    id: &WorkflowId,
    settings: &WorkflowSettings,
    cancel: CancellationToken,
  ) -> Result<(), ComponentError> {
    let _guard = rmw::lock(&self.locks, id, &cancel).await?;

    let mut document = rmw::fetch_existing(
      &self.client,
      id,
      || "to update its settings".to_string(),
      &cancel,
    )
    .await?;
    settings.apply_to(id, &mut document)?;

    rmw::replace(
      &self.client,
      id,
      &document.replacement(),
      || format!("updating workflow {id}"),
      &cancel,
    )
    .await?;

    info!("workflow updated");
    Ok(())
  }

  /// Delete a workflow. Deleting a missing workflow succeeds.
  #[instrument(
    name = "workflow_delete",
    skip(self, id, cancel),
    fields(workflow = %id.workflow_name)
  )]
  pub async fn delete(&self, id: &WorkflowId, cancel: CancellationToken) -> Result<(), ComponentError> {
    let _guard = rmw::lock(&self.locks, id, &cancel).await?;

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        return Err(ComponentError::Cancelled { workflow: id.clone() });
      }
      result = self.client.delete_workflow(id) => result,
    };

    match result {
      Ok(()) => {
        info!("workflow deleted");
        Ok(())
      }
      Err(e) if e.is_not_found() => {
        debug!("workflow already absent");
        Ok(())
      }
      Err(e) => Err(ComponentError::remote(format!("deleting workflow {id}"), e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn workflow_id() -> WorkflowId {
    WorkflowId::new("sub", "rg", "wf1")
  }

  #[test]
  fn test_settings_defaults_from_json() {
    let settings: WorkflowSettings =
      serde_json::from_value(json!({ "location": "westeurope" })).expect("valid settings");

    assert_eq!(settings, WorkflowSettings::new("westeurope"));
  }

  #[test]
  fn test_new_document_shape() {
    let mut settings = WorkflowSettings::new("westeurope");
    settings.enabled = false;
    settings.tags.insert("env".to_string(), "test".to_string());
    settings
      .parameter_definitions
      .insert("retries".to_string(), json!({ "type": "Int" }));
    settings.parameters.insert("retries".to_string(), "3".to_string());

    let document = settings.to_document().expect("settings are valid");

    assert_eq!(
      document.into_value(),
      json!({
        "location": "westeurope",
        "tags": { "env": "test" },
        "properties": {
          "definition": {
            "$schema": DEFAULT_SCHEMA,
            "contentVersion": "1.0.0.0",
            "parameters": { "retries": { "type": "Int" } },
            "actions": {},
            "triggers": {}
          },
          "parameters": { "retries": { "type": "Int", "value": 3 } },
          "state": "Disabled"
        }
      })
    );
  }

  #[test]
  fn test_apply_keeps_components() {
    let mut document: WorkflowDocument = serde_json::from_value(json!({
      "location": "westeurope",
      "properties": {
        "state": "Enabled",
        "definition": {
          "$schema": "custom",
          "actions": { "a1": { "type": "Http" } },
          "triggers": { "t1": { "type": "Request" } }
        }
      }
    }))
    .expect("valid document");

    let mut settings = WorkflowSettings::new("northeurope");
    settings.enabled = false;
    settings
      .apply_to(&workflow_id(), &mut document)
      .expect("document is valid");

    assert_eq!(document.location(), Some("northeurope"));
    assert_eq!(document.state(), Some("Disabled"));
    let definition = document.definition().expect("definition is valid");
    assert_eq!(definition.get("$schema"), Some(&json!("custom")));
    assert_eq!(definition["actions"], json!({ "a1": { "type": "Http" } }));
    assert_eq!(definition["triggers"], json!({ "t1": { "type": "Request" } }));
  }

  #[test]
  fn test_from_document_linked_resources() {
    let document: WorkflowDocument = serde_json::from_value(json!({
      "location": "westeurope",
      "properties": {
        "definition": {},
        "accessControl": { "contents": { "allowedCallerIpAddresses": [] } },
        "integrationAccount": { "id": "ia1", "name": "ignored" },
        "integrationServiceEnvironment": null
      }
    }))
    .expect("valid document");

    let settings =
      WorkflowSettings::from_document(&workflow_id(), &document).expect("document is valid");

    assert_eq!(
      settings.access_control,
      Some(json!({ "contents": { "allowedCallerIpAddresses": [] } }))
    );
    assert_eq!(settings.integration_account_id.as_deref(), Some("ia1"));
    assert_eq!(settings.integration_service_environment_id, None);
  }

  #[test]
  fn test_from_document() {
    let document: WorkflowDocument = serde_json::from_value(json!({
      "location": "westeurope",
      "tags": { "env": "test" },
      "properties": {
        "state": "Disabled",
        "definition": {
          "contentVersion": "2.0.0.0",
          "parameters": {
            "retries": { "type": "Int" },
            "token": { "type": "SecureString" }
          }
        },
        "parameters": {
          "retries": { "type": "Int", "value": 3 },
          "token": { "type": "SecureString" }
        }
      }
    }))
    .expect("valid document");

    let settings =
      WorkflowSettings::from_document(&workflow_id(), &document).expect("document is valid");

    assert_eq!(settings.location, "westeurope");
    assert_eq!(settings.tags.get("env").map(String::as_str), Some("test"));
    assert!(!settings.enabled);
    assert_eq!(settings.schema, DEFAULT_SCHEMA);
    assert_eq!(settings.content_version, "2.0.0.0");
    assert_eq!(
      settings.parameters,
      BTreeMap::from([("retries".to_string(), "3".to_string())])
    );
  }
}
