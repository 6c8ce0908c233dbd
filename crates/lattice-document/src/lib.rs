//! Lattice Document
//!
//! This crate models the remote Logic App workflow object as an untyped,
//! order-preserving JSON tree. Only the pieces that component management
//! touches get typed accessors:
//! - the envelope fields (`location`, `tags`, `identity`)
//! - `properties.definition` and its `actions` / `triggers` maps
//! - the replacement document sent back on a whole-document write
//!
//! Everything else in the definition (`$schema`, `contentVersion`,
//! `parameters`, fields this crate has never heard of) is carried verbatim.

mod document;
mod error;
mod identity;
mod kind;

pub use document::{WorkflowDocument, WRITABLE_PROPERTIES};
pub use error::DocumentError;
pub use identity::identity_for_replace;
pub use kind::ComponentKind;
