//! Business logic and port definitions for Agentry.
//!
//! This crate defines the "ports" (repository and engine traits) that the
//! infrastructure layer implements, the shared agent-instance cache, and the
//! services that run conversations against it. It depends only on
//! `agentry-types` -- never on `agentry-infra` or any database/IO crate.

pub mod chat;
pub mod engine;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
