//! Shared domain types for Agentry.
//!
//! This crate contains the core domain types used across Agentry:
//! agent configurations, conversation sessions, engine results, cache
//! statistics, global config, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
