//! CLI subcommands.

pub mod ask;
pub mod chat;
pub mod common;
pub mod config;
mod render;
pub mod tables;
