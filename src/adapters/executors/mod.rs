//! Action-executor implementations shipped with the crate.

pub mod dry_run;

pub use dry_run::{default_executors, DryRunExecutor};
