use thiserror::Error;

/// Errors returned by a [`WorkflowClient`](crate::WorkflowClient).
#[derive(Debug, Error)]
pub enum ClientError {
  /// The workflow (or trigger) does not exist.
  #[error("resource not found")]
  NotFound,

  /// The request could not be sent or the response could not be read.
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The service answered with a non-success status.
  #[error("unexpected status {status}: {body}")]
  Status { status: u16, body: String },

  /// The response body is not the JSON that was expected.
  #[error("invalid response body: {0}")]
  Decode(#[from] serde_json::Error),

  /// The response is valid JSON but lacks a required field.
  #[error("response is missing `{field}`")]
  MissingField { field: &'static str },

  /// The configured endpoint cannot be used as a base URL.
  #[error("invalid endpoint: {0}")]
  Endpoint(String),

  /// No bearer token is available.
  #[error("no access token: set the `{var}` environment variable")]
  MissingToken { var: String },
}

impl ClientError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ClientError::NotFound)
  }
}
