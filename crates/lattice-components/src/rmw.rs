use lattice_client::WorkflowClient;
use lattice_document::WorkflowDocument;
use lattice_locks::{NamedLockGuard, NamedLocks};
use lattice_resource_id::WorkflowId;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ComponentError;

/// Namespace shared by every lock taken on a workflow document.
///
/// Actions, triggers and the workflow itself all use it: they write the same
/// document, so a lock per kind would still lose updates.
const LOCK_NAMESPACE: &str = "logic_app_workflow";

/// Key of the named lock guarding a workflow's document.
pub fn lock_key(workflow_name: &str) -> String {
  format!("{LOCK_NAMESPACE}/{workflow_name}")
}

/// Take the lock for `workflow`, giving up if `cancel` fires first.
pub(crate) async fn lock(
  locks: &NamedLocks,
  workflow: &WorkflowId,
  cancel: &CancellationToken,
) -> Result<NamedLockGuard, ComponentError> {
  locks
    .acquire_with_cancel(&lock_key(&workflow.workflow_name), cancel)
    .await
    .map_err(|_| ComponentError::Cancelled {
      workflow: workflow.clone(),
    })
}

/// Get the current document. A missing workflow is `Ok(None)`.
///
/// `context` names what the document was fetched for.
pub(crate) async fn fetch<C: WorkflowClient + ?Sized>(
  client: &C,
  workflow: &WorkflowId,
  context: impl FnOnce() -> String,
  cancel: &CancellationToken,
) -> Result<Option<WorkflowDocument>, ComponentError> {
  let result = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      return Err(ComponentError::Cancelled { workflow: workflow.clone() });
    }
    result = client.get_workflow(workflow) => result,
  };

  match result {
    Ok(document) => Ok(Some(document)),
    Err(e) if e.is_not_found() => {
      debug!(%workflow, "workflow not found");
      Ok(None)
    }
    Err(e) => Err(ComponentError::remote(
      format!("retrieving workflow {workflow} {}", context()),
      e,
    )),
  }
}

/// Get the current document, failing with `NotFound` when it is missing.
pub(crate) async fn fetch_existing<C: WorkflowClient + ?Sized>(
  client: &C,
  workflow: &WorkflowId,
  context: impl FnOnce() -> String,
  cancel: &CancellationToken,
) -> Result<WorkflowDocument, ComponentError> {
  fetch(client, workflow, context, cancel)
    .await?
    .ok_or_else(|| ComponentError::NotFound {
      workflow: workflow.clone(),
    })
}

/// Replace the whole document. `context` names what the write was for.
pub(crate) async fn replace<C: WorkflowClient + ?Sized>(
  client: &C,
  workflow: &WorkflowId,
  document: &WorkflowDocument,
  context: impl FnOnce() -> String,
  cancel: &CancellationToken,
) -> Result<(), ComponentError> {
  let result = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      return Err(ComponentError::Cancelled { workflow: workflow.clone() });
    }
    result = client.replace_workflow(workflow, document) => result,
  };

  result.map_err(|e| ComponentError::remote(context(), e))
}
