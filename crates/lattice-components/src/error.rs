use lattice_client::ClientError;
use lattice_document::{ComponentKind, DocumentError};
use lattice_resource_id::WorkflowId;
use thiserror::Error;

/// Errors returned by component and workflow operations.
#[derive(Debug, Error)]
pub enum ComponentError {
  /// The parent workflow does not exist.
  #[error("workflow {workflow} was not found")]
  NotFound { workflow: WorkflowId },

  /// The workflow exists but its definition is not shaped as expected.
  #[error("workflow {workflow} has a malformed definition: {source}")]
  MalformedDocument {
    workflow: WorkflowId,
    #[source]
    source: DocumentError,
  },

  /// A create targeted a resource that is already present. Nothing was written.
  #[error("a resource with the ID {id:?} already exists; it needs to be imported to be managed")]
  AlreadyExists { id: String },

  /// A call to the remote API failed.
  #[error("{context}: {source}")]
  Remote {
    context: String,
    #[source]
    source: ClientError,
  },

  /// The operation was cancelled before it wrote anything.
  #[error("operation on workflow {workflow} was cancelled")]
  Cancelled { workflow: WorkflowId },

  /// The id addresses the wrong kind of component.
  #[error("{id} is not a {expected} id")]
  InvalidKind { id: String, expected: ComponentKind },

  /// A workflow parameter value does not fit its definition.
  #[error("parameter `{name}`: {message}")]
  InvalidParameter { name: String, message: String },
}

impl ComponentError {
  pub(crate) fn remote(context: impl Into<String>, source: ClientError) -> Self {
    ComponentError::Remote {
      context: context.into(),
      source,
    }
  }

  pub(crate) fn invalid_parameter(name: &str, message: impl Into<String>) -> Self {
    ComponentError::InvalidParameter {
      name: name.to_string(),
      message: message.into(),
    }
  }

  /// True when the workflow, or the remote object addressed, is missing.
  pub fn is_not_found(&self) -> bool {
    match self {
      ComponentError::NotFound { .. } => true,
      ComponentError::Remote { source, .. } => source.is_not_found(),
      _ => false,
    }
  }
}
