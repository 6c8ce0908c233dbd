//! Lattice Client
//!
//! The remote API surface that component management is built on. The API
//! only offers whole-document semantics:
//! - get a workflow
//! - replace a workflow (there is no patch verb)
//! - delete a workflow
//! - fetch the callback URL of a trigger
//!
//! [`HttpWorkflowClient`] talks to the resource manager REST API.
//! [`InMemoryWorkflowClient`] keeps workflows in process memory and behaves
//! like the service where it matters for tests.

mod client;
mod error;
mod http;
mod memory;

pub use client::WorkflowClient;
pub use error::ClientError;
pub use http::HttpWorkflowClient;
pub use memory::InMemoryWorkflowClient;
