//! Lattice Locks
//!
//! Advisory mutexes keyed by name, shared by everything in one process.
//!
//! A workflow's actions and triggers all live in the same remote document, so
//! every read-modify-write against a workflow takes the lock for that
//! workflow's name first. Unrelated names never contend.
//!
//! The locks are in-process only. Two processes touching the same workflow
//! can still overwrite each other's changes.

mod named;

pub use named::{Cancelled, NamedLockGuard, NamedLocks};
