//! Lightweight LLM integration helpers.
//!
//! Typed wrappers for tool-calling chat models used by the SQL agent.

/// Assistant reply type.
pub mod ai;
/// Chat model client and the backend trait the agent drives.
pub mod chat_models;
pub(crate) mod chat_runtime;
/// Provider selection, endpoints and credentials.
pub mod provider;
/// Tool schema and invocation payload helpers.
pub mod tools;

pub use chat_runtime::RetryPolicy;
