//! simwire - wire layer for distributed lockstep simulation
//!
//! Everything that crosses the coordinator/worker boundary lives here:
//!
//! - [`frame`] - length-prefixed frame transport over Unix domain sockets
//! - [`envelope`] - the tagged message envelope carried inside each frame
//! - [`payload`] - typed payload schemas embedded in envelopes
//! - [`error`] - wire-layer error types
//!
//! The frame format is `[4-byte big-endian u32 length][UTF-8 JSON envelope]`.
//! Within one connection frames are delivered in send order; no ordering is
//! implied across connections.

pub mod envelope;
pub mod error;
pub mod frame;
pub mod payload;

pub use envelope::{Envelope, Kind};
pub use error::WireError;
pub use frame::{FrameListener, FrameStream, MAX_FRAME_LEN};
pub use payload::{AssignPayload, StateRecord, StatesPayload, StepPayload};
