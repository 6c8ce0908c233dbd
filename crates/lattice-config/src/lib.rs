//! Lattice Config
//!
//! Serializable configuration for talking to the workflow API.
//!
//! Configuration is loaded from a JSON file and then overridden by
//! environment variables:
//!
//! ```json
//! {
//!   "endpoint": "https://management.azure.com",
//!   "api_version": "2019-05-01",
//!   "request_timeout_secs": 60,
//!   "token_env": "LATTICE_ACCESS_TOKEN"
//! }
//! ```
//!
//! Every field is optional; missing fields take their default.

mod config;
mod error;

pub use config::{
  Config, DEFAULT_API_VERSION, DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENV, ENV_API_VERSION, ENV_ENDPOINT,
  ENV_REQUEST_TIMEOUT,
};
pub use error::ConfigError;
