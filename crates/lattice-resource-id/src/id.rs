use std::fmt;
use std::str::{FromStr, Split};

use lattice_document::ComponentKind;

use crate::error::IdError;

/// Provider namespace of Logic App workflows.
pub const PROVIDER_NAMESPACE: &str = "Microsoft.Logic";

/// Identifies a workflow: subscription → resource group → workflow name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkflowId {
  pub subscription_id: String,
  pub resource_group_name: String,
  pub workflow_name: String,
}

impl WorkflowId {
  pub fn new(
    subscription_id: impl Into<String>,
    resource_group_name: impl Into<String>,
    workflow_name: impl Into<String>,
  ) -> Self {
    Self {
      subscription_id: subscription_id.into(),
      resource_group_name: resource_group_name.into(),
      workflow_name: workflow_name.into(),
    }
  }

  /// Parse a workflow id. Component ids are rejected (trailing segments).
  pub fn parse(input: &str) -> Result<Self, IdError> {
    let mut segments = Segments::new(input)?;
    let workflow = segments.workflow()?;
    segments.finish()?;
    Ok(workflow)
  }

  /// Compose the id of a component inside this workflow.
  pub fn component(&self, kind: ComponentKind, name: impl Into<String>) -> ComponentId {
    ComponentId::new(self.clone(), kind, name)
  }

  pub fn action(&self, name: impl Into<String>) -> ComponentId {
    self.component(ComponentKind::Action, name)
  }

  pub fn trigger(&self, name: impl Into<String>) -> ComponentId {
    self.component(ComponentKind::Trigger, name)
  }
}

impl fmt::Display for WorkflowId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "/subscriptions/{}/resourceGroups/{}/providers/{}/workflows/{}",
      self.subscription_id, self.resource_group_name, PROVIDER_NAMESPACE, self.workflow_name
    )
  }
}

impl FromStr for WorkflowId {
  type Err = IdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

/// Identifies an action or trigger inside a workflow.
///
/// Two ids with the same workflow, kind and name are the same logical
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId {
  pub workflow: WorkflowId,
  pub kind: ComponentKind,
  pub name: String,
}

impl ComponentId {
  pub fn new(workflow: WorkflowId, kind: ComponentKind, name: impl Into<String>) -> Self {
    Self {
      workflow,
      kind,
      name: name.into(),
    }
  }

  pub fn parse(input: &str) -> Result<Self, IdError> {
    let mut segments = Segments::new(input)?;
    let workflow = segments.workflow()?;

    let key = segments.next().ok_or(IdError::MissingSegment {
      key: "actions|triggers",
    })?;
    let kind = ComponentKind::from_definition_key(key).ok_or_else(|| IdError::UnexpectedSegment {
      expected: "actions|triggers",
      found: key.to_string(),
    })?;
    let name = segments.value_after(kind.definition_key())?;
    segments.finish()?;

    Ok(Self::new(workflow, kind, name))
  }

  pub fn workflow_name(&self) -> &str {
    &self.workflow.workflow_name
  }
}

impl fmt::Display for ComponentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.workflow, self.kind.definition_key(), self.name)
  }
}

impl FromStr for ComponentId {
  type Err = IdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

/// `/key/value` pair reader over an id string.
struct Segments<'a> {
  inner: Split<'a, char>,
}

impl<'a> Segments<'a> {
  fn new(input: &'a str) -> Result<Self, IdError> {
    let rest = input.strip_prefix('/').ok_or(IdError::MissingLeadingSlash)?;
    Ok(Self {
      inner: rest.split('/'),
    })
  }

  fn next(&mut self) -> Option<&'a str> {
    self.inner.next()
  }

  /// Expect `key` (case-insensitive) followed by a non-empty value.
  fn value(&mut self, key: &'static str) -> Result<&'a str, IdError> {
    let found = self.inner.next().ok_or(IdError::MissingSegment { key })?;
    if !found.eq_ignore_ascii_case(key) {
      return Err(IdError::UnexpectedSegment {
        expected: key,
        found: found.to_string(),
      });
    }
    self.value_after(key)
  }

  /// Read the value following an already consumed `key`.
  fn value_after(&mut self, key: &'static str) -> Result<&'a str, IdError> {
    match self.inner.next() {
      Some(value) if !value.is_empty() => Ok(value),
      _ => Err(IdError::EmptyValue { key }),
    }
  }

  fn workflow(&mut self) -> Result<WorkflowId, IdError> {
    let subscription_id = self.value("subscriptions")?;
    let resource_group_name = self.value("resourceGroups")?;
    let provider = self.value("providers")?;
    if !provider.eq_ignore_ascii_case(PROVIDER_NAMESPACE) {
      return Err(IdError::UnexpectedProvider {
        found: provider.to_string(),
      });
    }
    let workflow_name = self.value("workflows")?;

    Ok(WorkflowId::new(
      subscription_id,
      resource_group_name,
      workflow_name,
    ))
  }

  fn finish(mut self) -> Result<(), IdError> {
    let rest: Vec<&str> = self.inner.by_ref().collect();
    if rest.is_empty() {
      Ok(())
    } else {
      Err(IdError::TrailingSegments {
        rest: rest.join("/"),
      })
    }
  }
}
