//! Consumer-facing facade for Agentry.
//!
//! [`AppState`] wires storage, the agent-instance cache, the engine factory
//! and the conversation orchestrator together. There is no transport here:
//! an embedding HTTP server or CLI calls these methods directly and maps
//! [`ApiError::kind`] to its own status codes.

pub mod error;
pub mod state;
pub mod sweeper;

pub use error::{ApiError, ErrorKind};
pub use state::{AppState, HealthReport};
pub use agentry_observe::{TracingOptions, init_tracing, shutdown_tracing};
