//! Database access for the SQL agent's tools.

pub mod database;
pub mod guard;

pub use database::{DatabaseError, Dialect, SqlDatabase};
