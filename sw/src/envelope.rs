//! The wire envelope carried inside every frame
//!
//! JSON schema (bit-exact, field order matters for interoperability):
//! `{"type":"<TYPE>","payload":"<escaped string>","timestamp":<number>}`.
//! The payload is itself JSON text whose schema depends on the type tag
//! (see [`crate::payload`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WireError;

/// The eight message tags of the coordination protocol
///
/// Any unrecognized tag deserializes to `Error` so that type-vocabulary skew
/// between coordinator and worker degrades instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// Coordinator -> worker: entity assignment
    Init,
    /// Coordinator -> worker: advance by dt
    Step,
    /// Coordinator -> worker: report current entity states
    SyncRequest,
    /// Coordinator -> worker: stop the event loop
    Shutdown,
    /// Worker -> coordinator: handshake / acknowledgment
    Ready,
    /// Worker -> coordinator: step finished
    StepComplete,
    /// Worker -> coordinator: entity state report
    SyncResponse,
    /// Failure placeholder; also the fallback for unknown tags
    #[serde(other)]
    Error,
}

/// An immutable message envelope: tag, opaque payload, send-time timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub payload: String,
    pub timestamp: f64,
}

impl Envelope {
    /// Create an envelope with a raw payload string
    pub fn new(kind: Kind, payload: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind,
            payload: payload.into(),
            timestamp,
        }
    }

    /// Create an envelope carrying a typed payload serialized to JSON
    pub fn with_payload<T: Serialize>(kind: Kind, payload: &T, timestamp: f64) -> Result<Self, WireError> {
        let payload = serde_json::to_string(payload)?;
        Ok(Self::new(kind, payload, timestamp))
    }

    /// Create an `ERROR` envelope with a free-text reason
    pub fn error(reason: impl Into<String>, timestamp: f64) -> Self {
        Self::new(Kind::Error, reason, timestamp)
    }

    /// Serialize to the wire JSON
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from wire bytes
    ///
    /// The envelope is advisory framing, not a general parser: bytes that are
    /// not a well-formed envelope decode to an `ERROR` envelope carrying the
    /// reason rather than raising.
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Envelope::decode: malformed envelope");
                Self::error(format!("malformed envelope: {}", e), 0.0)
            }
        }
    }

    /// Parse the embedded payload into a typed struct
    ///
    /// Degrades to the type's default when the payload does not parse; the
    /// payload schemas are advisory, so partial or missing fields yield
    /// defaults rather than errors.
    pub fn parse_payload<T: DeserializeOwned + Default>(&self) -> T {
        match serde_json::from_str(&self.payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(kind = ?self.kind, error = %e, "Envelope::parse_payload: falling back to default");
                T::default()
            }
        }
    }
}
