use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lattice_document::{ComponentKind, WorkflowDocument};
use lattice_resource_id::WorkflowId;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::client::WorkflowClient;
use crate::error::ClientError;

/// In-memory stand-in for the remote workflow API.
///
/// Stored documents are decorated the way the service decorates them
/// (`id`, `name`, `provisioningState`, evaluated recurrences, identity
/// principals), and a replace carrying populated user-assigned identity
/// values is rejected the way the service rejects it. An optional latency
/// is applied to every call so concurrent callers interleave, and one-shot
/// failures can be queued for the next get or replace.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowClient {
  workflows: Mutex<HashMap<WorkflowId, WorkflowDocument>>,
  latency: Option<Duration>,
  replace_calls: AtomicUsize,
  next_get_error: Mutex<Option<ClientError>>,
  next_replace_error: Mutex<Option<ClientError>>,
}

impl InMemoryWorkflowClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every call by `latency`.
  pub fn with_latency(latency: Duration) -> Self {
    Self {
      latency: Some(latency),
      ..Self::default()
    }
  }

  /// Store a document as-is, bypassing replace validation.
  pub fn insert(&self, id: WorkflowId, document: WorkflowDocument) {
    self.workflows.lock().insert(id, document);
  }

  /// Current stored document, if any.
  pub fn workflow(&self, id: &WorkflowId) -> Option<WorkflowDocument> {
    self.workflows.lock().get(id).cloned()
  }

  /// Number of replace calls received, including rejected ones.
  pub fn replace_calls(&self) -> usize {
    self.replace_calls.load(Ordering::SeqCst)
  }

  /// Fail the next `get_workflow` call with `error`.
  pub fn fail_next_get(&self, error: ClientError) {
    *self.next_get_error.lock() = Some(error);
  }

  /// Fail the next `replace_workflow` call with `error`. Nothing is stored.
  pub fn fail_next_replace(&self, error: ClientError) {
    *self.next_replace_error.lock() = Some(error);
  }

  async fn simulate_latency(&self) {
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
  }
}

#[async_trait]
impl WorkflowClient for InMemoryWorkflowClient {
  async fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowDocument, ClientError> {
    self.simulate_latency().await;
    if let Some(error) = self.next_get_error.lock().take() {
      return Err(error);
    }
    self.workflow(id).ok_or(ClientError::NotFound)
  }

  async fn replace_workflow(
    &self,
    id: &WorkflowId,
    document: &WorkflowDocument,
  ) -> Result<(), ClientError> {
    self.replace_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_latency().await;
    if let Some(error) = self.next_replace_error.lock().take() {
      return Err(error);
    }

    let stored = served(id, document)?;
    self.workflows.lock().insert(id.clone(), stored);
    Ok(())
  }

  async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), ClientError> {
    self.simulate_latency().await;
    self
      .workflows
      .lock()
      .remove(id)
      .map(|_| ())
      .ok_or(ClientError::NotFound)
  }

  async fn trigger_callback_url(
    &self,
    id: &WorkflowId,
    trigger_name: &str,
  ) -> Result<String, ClientError> {
    self.simulate_latency().await;

    let document = self.workflow(id).ok_or(ClientError::NotFound)?;
    let trigger = document
      .component(ComponentKind::Trigger, trigger_name)
      .map_err(|e| bad_request(e.to_string()))?;
    if trigger.is_none() {
      return Err(ClientError::NotFound);
    }

    Ok(format!(
      "https://workflows.lattice.invalid/workflows/{}/triggers/{}/paths/invoke?api-version=2016-10-01",
      id.workflow_name, trigger_name
    ))
  }
}

fn bad_request(message: impl Into<String>) -> ClientError {
  ClientError::Status {
    status: 400,
    body: message.into(),
  }
}

/// The document as the service would store and later return it.
fn served(id: &WorkflowId, document: &WorkflowDocument) -> Result<WorkflowDocument, ClientError> {
  let mut map = document.as_map().clone();

  if let Some(identities) = map
    .get_mut("identity")
    .and_then(|identity| identity.get_mut("userAssignedIdentities"))
    .and_then(Value::as_object_mut)
  {
    for (key, value) in identities.iter_mut() {
      if value.as_object().is_some_and(|v| !v.is_empty()) {
        return Err(bad_request(format!(
          "user assigned identity `{key}` must be sent as an empty object"
        )));
      }
      *value = json!({
        "principalId": format!("{key}/principal"),
        "clientId": format!("{key}/client"),
      });
    }
  }

  map.insert("id".to_string(), Value::String(id.to_string()));
  map.insert("name".to_string(), Value::String(id.workflow_name.clone()));
  map.insert(
    "type".to_string(),
    Value::String("Microsoft.Logic/workflows".to_string()),
  );

  let properties = map
    .entry("properties")
    .or_insert_with(|| Value::Object(Map::new()));
  if let Value::Object(properties) = properties {
    properties.insert(
      "provisioningState".to_string(),
      Value::String("Succeeded".to_string()),
    );
    if let Some(triggers) = properties
      .get_mut("definition")
      .and_then(|definition| definition.get_mut("triggers"))
      .and_then(Value::as_object_mut)
    {
      for trigger in triggers.values_mut() {
        if let Some(body) = trigger.as_object_mut() {
          if let Some(recurrence) = body.get("recurrence").cloned() {
            body.insert("evaluatedRecurrence".to_string(), recurrence);
          }
        }
      }
    }
  }

  Ok(WorkflowDocument::from_map(map))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn workflow_id() -> WorkflowId {
    WorkflowId::new("sub", "rg", "wf1")
  }

  fn document(value: Value) -> WorkflowDocument {
    serde_json::from_value(value).expect("document should deserialize")
  }

  #[tokio::test]
  async fn test_replace_decorates_stored_document() {
    let client = InMemoryWorkflowClient::new();
    let id = workflow_id();

    client
      .replace_workflow(
        &id,
        &document(json!({
          "location": "westeurope",
          "properties": {
            "definition": {
              "triggers": {
                "daily": { "type": "Recurrence", "recurrence": { "frequency": "Day", "interval": 1 } }
              }
            }
          }
        })),
      )
      .await
      .expect("replace should succeed");

    let stored = client.get_workflow(&id).await.expect("workflow exists");
    assert_eq!(stored.as_map().get("name"), Some(&json!("wf1")));
    assert_eq!(
      stored.properties().and_then(|p| p.get("provisioningState")),
      Some(&json!("Succeeded"))
    );
    assert_eq!(
      stored.component(ComponentKind::Trigger, "daily"),
      Ok(Some(&json!({
        "type": "Recurrence",
        "recurrence": { "frequency": "Day", "interval": 1 },
        "evaluatedRecurrence": { "frequency": "Day", "interval": 1 }
      })))
    );
    assert_eq!(client.replace_calls(), 1);
  }

  #[tokio::test]
  async fn test_replace_rejects_populated_identity_values() {
    let client = InMemoryWorkflowClient::new();

    let err = client
      .replace_workflow(
        &workflow_id(),
        &document(json!({
          "identity": {
            "type": "UserAssigned",
            "userAssignedIdentities": { "k1": { "principalId": "p" } }
          },
          "properties": { "definition": {} }
        })),
      )
      .await
      .unwrap_err();

    assert!(matches!(err, ClientError::Status { status: 400, .. }));
    assert!(client.workflow(&workflow_id()).is_none());
  }

  #[tokio::test]
  async fn test_replace_fills_identity_values() {
    let client = InMemoryWorkflowClient::new();
    let id = workflow_id();

    client
      .replace_workflow(
        &id,
        &document(json!({
          "identity": { "type": "UserAssigned", "userAssignedIdentities": { "k1": {} } },
          "properties": { "definition": {} }
        })),
      )
      .await
      .expect("replace should succeed");

    let stored = client.workflow(&id).expect("workflow exists");
    let principal = stored
      .identity()
      .and_then(|i| i.pointer("/userAssignedIdentities/k1/principalId"));
    assert_eq!(principal, Some(&json!("k1/principal")));
  }

  #[tokio::test]
  async fn test_queued_failures_apply_once() {
    let client = InMemoryWorkflowClient::new();
    let id = workflow_id();
    let body = document(json!({ "properties": { "definition": {} } }));
    client.insert(id.clone(), body.clone());

    client.fail_next_get(bad_request("outage"));
    let err = client.get_workflow(&id).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 400, .. }));
    assert!(client.get_workflow(&id).await.is_ok());

    client.fail_next_replace(ClientError::Status {
      status: 409,
      body: "conflict".to_string(),
    });
    let err = client.replace_workflow(&id, &body).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 409, .. }));
    assert_eq!(client.workflow(&id), Some(body.clone()));
    assert_eq!(client.replace_calls(), 1);

    client
      .replace_workflow(&id, &body)
      .await
      .expect("second replace should succeed");
    assert_eq!(client.replace_calls(), 2);
  }

  #[tokio::test]
  async fn test_delete_missing_workflow() {
    let client = InMemoryWorkflowClient::new();

    let err = client.delete_workflow(&workflow_id()).await.unwrap_err();

    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn test_trigger_callback_url() {
    let client = InMemoryWorkflowClient::new();
    let id = workflow_id();
    client.insert(
      id.clone(),
      document(json!({
        "properties": { "definition": { "triggers": { "manual": { "type": "Request" } } } }
      })),
    );

    let url = client
      .trigger_callback_url(&id, "manual")
      .await
      .expect("trigger exists");
    assert!(url.contains("/workflows/wf1/triggers/manual/"));

    let err = client.trigger_callback_url(&id, "other").await.unwrap_err();
    assert!(err.is_not_found());
  }
}
