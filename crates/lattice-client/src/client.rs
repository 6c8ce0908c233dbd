use std::sync::Arc;

use async_trait::async_trait;
use lattice_document::WorkflowDocument;
use lattice_resource_id::WorkflowId;

use crate::error::ClientError;

/// Whole-document access to remote workflows.
///
/// Implementations report a missing workflow as [`ClientError::NotFound`]
/// and never retry on their own.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
  /// Fetch the current document of a workflow.
  async fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowDocument, ClientError>;

  /// Replace the whole workflow document (creating the workflow if needed).
  async fn replace_workflow(
    &self,
    id: &WorkflowId,
    document: &WorkflowDocument,
  ) -> Result<(), ClientError>;

  /// Delete a workflow.
  async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), ClientError>;

  /// Fetch the URL that invokes a trigger.
  async fn trigger_callback_url(
    &self,
    id: &WorkflowId,
    trigger_name: &str,
  ) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: WorkflowClient + ?Sized> WorkflowClient for Arc<T> {
  async fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowDocument, ClientError> {
    (**self).get_workflow(id).await
  }

  async fn replace_workflow(
    &self,
    id: &WorkflowId,
    document: &WorkflowDocument,
  ) -> Result<(), ClientError> {
    (**self).replace_workflow(id, document).await
  }

  async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), ClientError> {
    (**self).delete_workflow(id).await
  }

  async fn trigger_callback_url(
    &self,
    id: &WorkflowId,
    trigger_name: &str,
  ) -> Result<String, ClientError> {
    (**self).trigger_callback_url(id, trigger_name).await
  }
}
