//! Simlock - lockstep simulation coordination
//!
//! A coordinator binds a Unix socket, waits for workers to connect and
//! handshake, partitions entities across them, and drives the simulation
//! in lockstep: each step is broadcast to every worker and the clock
//! advances once per step regardless of stragglers. Workers propagate
//! their assigned entities with a pluggable [`worker::Propagator`] and
//! report back after each step.
//!
//! Wire framing and message envelopes live in the `simwire` crate.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod orbit;
pub mod worker;

pub use config::{Config, RunConfig};
pub use coordinator::{Coordinator, CoordinatorConfig, StepTracker, WorkerAssignment};
pub use orbit::{CircularOrbit, OrbitConfig};
pub use worker::{Propagator, Worker};
