//! Adapters: SQLite persistence and built-in action executors.

pub mod executors;
pub mod sqlite;
