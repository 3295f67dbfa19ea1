//! Lockstep coordinator
//!
//! The coordinator owns the listening endpoint and every worker connection
//! slot, and drives the run lifecycle: accept workers, push entity
//! assignments, broadcast/collect step rounds, gather distributed state,
//! broadcast shutdown.

mod config;
mod core;
mod tracker;

pub use config::CoordinatorConfig;
pub use core::{Coordinator, WorkerAssignment};
pub use tracker::StepTracker;
