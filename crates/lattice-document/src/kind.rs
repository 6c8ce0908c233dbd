use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two kinds of component embedded in a workflow definition.
///
/// Both kinds share the same mutation logic. They differ only in the
/// definition key they live under and in what the service adds to a body
/// when it is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
  Action,
  Trigger,
}

impl ComponentKind {
  pub const ALL: [ComponentKind; 2] = [ComponentKind::Action, ComponentKind::Trigger];

  /// Key of the component map inside `properties.definition`.
  ///
  /// This is also the segment used in resource ids.
  pub fn definition_key(self) -> &'static str {
    match self {
      ComponentKind::Action => "actions",
      ComponentKind::Trigger => "triggers",
    }
  }

  /// Singular lowercase name, e.g. for log fields and messages.
  pub fn as_str(self) -> &'static str {
    match self {
      ComponentKind::Action => "action",
      ComponentKind::Trigger => "trigger",
    }
  }

  /// Resolve a definition key / id segment (`actions`, `triggers`), ignoring case.
  pub fn from_definition_key(key: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.definition_key().eq_ignore_ascii_case(key))
  }

  /// Fields the service adds to a stored body that callers never submit.
  pub fn server_injected_fields(self) -> &'static [&'static str] {
    match self {
      ComponentKind::Action => &[],
      // Recurrence triggers get an echo of their schedule after evaluation.
      ComponentKind::Trigger => &["evaluatedRecurrence"],
    }
  }

  /// Remove server-injected fields so a read body compares equal to what was written.
  pub fn strip_server_fields(self, body: &mut Value) {
    if let Value::Object(map) = body {
      for field in self.server_injected_fields() {
        map.shift_remove(*field);
      }
    }
  }
}

impl fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
