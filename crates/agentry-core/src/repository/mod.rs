//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (agentry-infra) implements. The core crate never depends on any
//! specific storage technology.
//!
//! Both stores follow the same lifecycle: `delete` clears the `active` flag,
//! `purge` removes the record. `get` returns inactive records too; filtering
//! is the caller's decision.

pub mod configuration;
pub mod conversation;
