//! Scheduled job dispatching for cronhook.
//!
//! This crate provides:
//! - Cron expression matching at minute, hour, day, month or weekday granularity
//! - Run-once job locks over the shared key-value store
//! - The job registry and a dispatcher that runs due jobs under their locks
//! - Built-in `http` and `heartbeat` jobs
//! - An optional in-process minute ticker

pub mod clock;
pub mod cron;
pub mod dispatcher;
pub mod jobs;
pub mod lock;
pub mod registry;
pub mod ticker;

#[cfg(test)]
mod testing;

pub use dispatcher::{Dispatch, Dispatcher, RunReport};
pub use registry::{JobDescriptor, JobRegistry};
pub use ticker::DispatchTicker;
