use serde_json::{Map, Value};

const USER_ASSIGNED_IDENTITIES: &str = "userAssignedIdentities";

/// Shape an `identity` block read from the service so it can be written back.
///
/// The service reports every user-assigned identity with its `principalId`
/// and `clientId`, but it rejects a replace that echoes those values. The
/// write contract only accepts each identity's resource id mapped to an empty
/// object, and the service re-derives the ids from the key. The keys are kept
/// and the values cleared here; this is not a data loss.
///
/// `principalId` and `tenantId` on the identity itself are read-only and are
/// dropped for the same reason. Any other field (notably `type`) is kept.
pub fn identity_for_replace(identity: &Value) -> Value {
  let Value::Object(fields) = identity else {
    return identity.clone();
  };

  let mut output = Map::new();
  for (key, value) in fields {
    match key.as_str() {
      "principalId" | "tenantId" => {}
      USER_ASSIGNED_IDENTITIES => {
        let cleared = match value {
          Value::Object(identities) => Value::Object(
            identities
              .keys()
              .map(|id| (id.clone(), Value::Object(Map::new())))
              .collect(),
          ),
          other => other.clone(),
        };
        output.insert(key.clone(), cleared);
      }
      _ => {
        output.insert(key.clone(), value.clone());
      }
    }
  }

  Value::Object(output)
}
