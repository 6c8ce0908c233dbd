//! Lattice Components
//!
//! Actions and triggers are separate logical resources, but they all live in
//! one physical document: the `definition` of their parent workflow. The
//! remote API only offers whole-document get and replace, so every change
//! here is a read-modify-write cycle:
//!
//! 1. take the named lock for the workflow
//! 2. get the current document
//! 3. change one entry of `actions` or `triggers` in memory
//! 4. replace the whole document
//!
//! [`ComponentStore`] implements that cycle for components, and
//! [`WorkflowStore`] manages the parent workflow under the same lock.

mod error;
mod parameters;
mod rmw;
mod store;
mod workflow;

pub use error::ComponentError;
pub use parameters::{ParameterType, expand_parameters, flatten_parameters};
pub use rmw::lock_key;
pub use store::{ComponentLookup, ComponentStore};
pub use workflow::{DEFAULT_CONTENT_VERSION, DEFAULT_SCHEMA, WorkflowSettings, WorkflowStore};
