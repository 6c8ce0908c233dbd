use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2019-05-01";
pub const DEFAULT_TOKEN_ENV: &str = "LATTICE_ACCESS_TOKEN";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const ENV_ENDPOINT: &str = "LATTICE_ENDPOINT";
pub const ENV_API_VERSION: &str = "LATTICE_API_VERSION";
pub const ENV_REQUEST_TIMEOUT: &str = "LATTICE_REQUEST_TIMEOUT_SECS";

/// Settings for the remote workflow API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the resource manager API.
  pub endpoint: String,

  /// `api-version` query parameter sent with every request.
  pub api_version: String,

  /// Per-request timeout, in seconds.
  pub request_timeout_secs: u64,

  /// Name of the environment variable holding the bearer token.
  /// The token itself is never stored in the config file.
  pub token_env: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ENDPOINT.to_string(),
      api_version: DEFAULT_API_VERSION.to_string(),
      request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
      token_env: DEFAULT_TOKEN_ENV.to_string(),
    }
  }
}

impl Config {
  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load configuration from a JSON file, or use defaults if it does not exist.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::default())
    }
  }

  /// Apply overrides from the process environment.
  pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
    self.with_overrides(|var| std::env::var(var).ok())
  }

  /// Apply overrides from `lookup`, which maps a variable name to its value.
  pub fn with_overrides(
    mut self,
    lookup: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ConfigError> {
    if let Some(endpoint) = lookup(ENV_ENDPOINT) {
      self.endpoint = endpoint;
    }
    if let Some(api_version) = lookup(ENV_API_VERSION) {
      self.api_version = api_version;
    }
    if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
      self.request_timeout_secs =
        timeout
          .trim()
          .parse()
          .map_err(|e: std::num::ParseIntError| ConfigError::InvalidOverride {
            var: ENV_REQUEST_TIMEOUT,
            message: e.to_string(),
          })?;
    }
    Ok(self)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}
