//! Natural-language questions over a music-store database.
//!
//! A hosted LLM acts as a SQL agent ([`agent::ToolCallingSqlAgent`]): it lists
//! and describes tables, runs read-only queries and narrates the answer. Each
//! conversation lives in a [`chat::Session`] that records the agent's steps for
//! every reply.

pub mod agent;
pub mod chat;
pub mod commands;
pub mod config;
pub mod logging;
pub mod rchain;
pub mod sql;

/// Version line with build metadata, shared by both binaries.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("SP_GIT_SHA"),
    "\nbuilt: ",
    env!("SP_BUILD_TS")
);
