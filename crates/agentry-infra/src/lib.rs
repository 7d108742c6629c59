//! Infrastructure layer for Agentry.
//!
//! Implements the ports defined in `agentry-core`: SQLite and in-memory
//! repositories, the `config.toml` loader, and the OpenAI-compatible engine
//! with its tool-server launcher.

pub mod config;
pub mod engine;
pub mod in_memory;
pub mod sqlite;
pub mod store;
