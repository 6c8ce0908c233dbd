//! Hierarchical resource ids for workflows and their embedded components.
//!
//! ```text
//! /subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Logic/workflows/{workflow}
//! /subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Logic/workflows/{workflow}/actions/{name}
//! /subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Logic/workflows/{workflow}/triggers/{name}
//! ```
//!
//! A component id addresses a component independently of the document it
//! lives in, so it can be stored by callers and parsed back later.

mod error;
mod id;

pub use error::IdError;
pub use id::{ComponentId, PROVIDER_NAMESPACE, WorkflowId};
