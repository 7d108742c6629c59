//! Conversation execution: per-session turn bookkeeping and the orchestrator
//! that drives shared engines.

pub mod orchestrator;
pub mod session;
