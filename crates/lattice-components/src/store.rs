use std::sync::Arc;

use lattice_client::WorkflowClient;
use lattice_document::{ComponentKind, WorkflowDocument};
use lattice_locks::NamedLocks;
use lattice_resource_id::ComponentId;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ComponentError;
use crate::rmw;

/// Outcome of reading a single component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentLookup {
  /// The parent workflow does not exist, so neither does the component.
  WorkflowMissing,

  /// The workflow exists but has no component with that name.
  ComponentMissing { workflow: WorkflowDocument },

  /// The component body, with server-injected fields removed.
  Found {
    body: Value,
    workflow: WorkflowDocument,
  },
}

impl ComponentLookup {
  pub fn body(&self) -> Option<&Value> {
    match self {
      ComponentLookup::Found { body, .. } => Some(body),
      _ => None,
    }
  }

  pub fn into_body(self) -> Option<Value> {
    match self {
      ComponentLookup::Found { body, .. } => Some(body),
      _ => None,
    }
  }

  /// The document the lookup was made against, if the workflow exists.
  pub fn workflow(&self) -> Option<&WorkflowDocument> {
    match self {
      ComponentLookup::WorkflowMissing => None,
      ComponentLookup::ComponentMissing { workflow } | ComponentLookup::Found { workflow, .. } => {
        Some(workflow)
      }
    }
  }
}

/// Manages actions and triggers inside their parent workflow documents.
///
/// Every operation runs under the named lock of the workflow, so operations
/// on the same workflow never interleave within this process. Operations on
/// different workflows run in parallel.
pub struct ComponentStore<C> {
  client: C,
  locks: Arc<NamedLocks>,
}

impl<C: WorkflowClient> ComponentStore<C> {
  /// Create a store that uses the process-wide lock registry.
  pub fn new(client: C) -> Self {
    Self::with_locks(client, NamedLocks::shared())
  }

  /// Create a store with its own lock registry.
  ///
  /// Stores only exclude each other when they share a registry.
  pub fn with_locks(client: C, locks: Arc<NamedLocks>) -> Self {
    Self { client, locks }
  }

  pub fn client(&self) -> &C {
    &self.client
  }

  /// Insert or overwrite a component.
  ///
  /// With `is_create`, a component that already exists is an
  /// [`AlreadyExists`](ComponentError::AlreadyExists) error and the document
  /// is not written. Returns the id of the written component.
  #[instrument(
    name = "component_upsert",
    skip(self, id, body, cancel),
    fields(
      workflow = %id.workflow_name(),
      kind = %id.kind,
      name = %id.name,
    )
  )]
  pub async fn upsert(
    &self,
    id: &ComponentId,
    body: Value,
    is_create: bool,
    cancel: CancellationToken,
  ) -> Result<ComponentId, ComponentError> {
    let workflow = &id.workflow;
    let _guard = rmw::lock(&self.locks, workflow, &cancel).await?;

    let mut document = rmw::fetch_existing(
      &self.client,
      workflow,
      || format!("to write {} {:?}", id.kind, id.name),
      &cancel,
    )
    .await?;
    let components =
      document
        .components_mut(id.kind)
        .map_err(|source| ComponentError::MalformedDocument {
          workflow: workflow.clone(),
          source,
        })?;

    if is_create && components.contains_key(&id.name) {
      warn!("component already exists");
      return Err(ComponentError::AlreadyExists {
        id: id.to_string(),
      });
    }
    components.insert(id.name.clone(), body);

    rmw::replace(
      &self.client,
      workflow,
      &document.replacement(),
      || format!("writing {} {:?} to workflow {}", id.kind, id.name, workflow),
      &cancel,
    )
    .await?;

    info!(created = is_create, "component written");
    Ok(id.clone())
  }

  /// Remove a component. Removing an absent component succeeds without
  /// writing anything.
  #[instrument(
    name = "component_remove",
    skip(self, id, cancel),
    fields(
      workflow = %id.workflow_name(),
      kind = %id.kind,
      name = %id.name,
    )
  )]
  pub async fn remove(
    &self,
    id: &ComponentId,
    cancel: CancellationToken,
  ) -> Result<(), ComponentError> {
    let workflow = &id.workflow;
    let _guard = rmw::lock(&self.locks, workflow, &cancel).await?;

    let mut document = rmw::fetch_existing(
      &self.client,
      workflow,
      || format!("to remove {} {:?}", id.kind, id.name),
      &cancel,
    )
    .await?;
    let removed = document
      .remove_component(id.kind, &id.name)
      .map_err(|source| ComponentError::MalformedDocument {
        workflow: workflow.clone(),
        source,
      })?;

    if removed.is_none() {
      debug!("component already absent");
      return Ok(());
    }

    rmw::replace(
      &self.client,
      workflow,
      &document.replacement(),
      || format!("removing {} {:?} from workflow {}", id.kind, id.name, workflow),
      &cancel,
    )
    .await?;

    info!("component removed");
    Ok(())
  }

  /// Read a component as it was last written.
  ///
  /// The lock is taken so a read never observes a document between another
  /// caller's get and replace.
  #[instrument(
    name = "component_read",
    skip(self, id, cancel),
    fields(
      workflow = %id.workflow_name(),
      kind = %id.kind,
      name = %id.name,
    )
  )]
  pub async fn read(
    &self,
    id: &ComponentId,
    cancel: CancellationToken,
  ) -> Result<ComponentLookup, ComponentError> {
    let workflow = &id.workflow;
    let _guard = rmw::lock(&self.locks, workflow, &cancel).await?;

    let fetched = rmw::fetch(
      &self.client,
      workflow,
      || format!("to read {} {:?}", id.kind, id.name),
      &cancel,
    )
    .await?;
    let Some(document) = fetched else {
      return Ok(ComponentLookup::WorkflowMissing);
    };

    let component = document
      .component(id.kind, &id.name)
      .map_err(|source| ComponentError::MalformedDocument {
        workflow: workflow.clone(),
        source,
      })?
      .cloned();

    match component {
      None => {
        debug!("component not present in workflow");
        Ok(ComponentLookup::ComponentMissing { workflow: document })
      }
      Some(mut body) => {
        id.kind.strip_server_fields(&mut body);
        Ok(ComponentLookup::Found {
          body,
          workflow: document,
        })
      }
    }
  }

  /// Fetch the URL that invokes a trigger.
  #[instrument(
    name = "trigger_callback_url",
    skip(self, id, cancel),
    fields(workflow = %id.workflow_name(), name = %id.name)
  )]
  pub async fn trigger_callback_url(
    &self,
    id: &ComponentId,
    cancel: CancellationToken,
  ) -> Result<String, ComponentError> {
    if id.kind != ComponentKind::Trigger {
      return Err(ComponentError::InvalidKind {
        id: id.to_string(),
        expected: ComponentKind::Trigger,
      });
    }

    let workflow = &id.workflow;
    let _guard = rmw::lock(&self.locks, workflow, &cancel).await?;

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        return Err(ComponentError::Cancelled { workflow: workflow.clone() });
      }
      result = self.client.trigger_callback_url(workflow, &id.name) => result,
    };

    result.map_err(|e| {
      ComponentError::remote(
        format!("retrieving callback URL of trigger {:?} in workflow {}", id.name, workflow),
        e,
      )
    })
  }
}
