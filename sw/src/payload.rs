//! Typed payload schemas embedded in envelopes
//!
//! Each struct serializes to the JSON text carried in [`crate::Envelope`]'s
//! `payload` field. Field names are part of the wire schema; do not rename.
//! All structs default to zeroes/empty so partial payloads degrade instead
//! of failing (see [`crate::Envelope::parse_payload`]).

use serde::{Deserialize, Serialize};

/// `INIT` payload: one-time declaration of which entities a worker owns
///
/// Entity ids are globally unique and each belongs to exactly one worker for
/// the lifetime of the run; this layer supports no reassignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignPayload {
    pub worker_id: usize,
    pub entity_ids: Vec<u64>,
}

/// `STEP` payload: advance every assigned entity by `dt` from `time`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPayload {
    pub dt: f64,
    pub time: f64,
}

/// One entity's serializable state vector: position, velocity, sim time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRecord {
    pub entity_id: u64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub time: f64,
}

impl StateRecord {
    /// Distance from the origin
    pub fn radius(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Speed magnitude
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }
}

/// `SYNC_RESPONSE` payload: a worker's current per-entity states
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatesPayload {
    pub states: Vec<StateRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, Kind};

    #[test]
    fn test_assign_payload_wire_format() {
        let payload = AssignPayload {
            worker_id: 0,
            entity_ids: vec![0, 1],
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"worker_id":0,"entity_ids":[0,1]}"#);
    }

    #[test]
    fn test_step_payload_wire_format() {
        let payload = StepPayload { dt: 60.0, time: 120.0 };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"dt":60.0,"time":120.0}"#);
    }

    #[test]
    fn test_state_record_field_names() {
        let record = StateRecord {
            entity_id: 3,
            px: 1.0,
            py: 2.0,
            pz: 3.0,
            vx: -1.0,
            vy: -2.0,
            vz: -3.0,
            time: 600.0,
        };
        let json = serde_json::to_string(&record).unwrap();
        for key in ["entity_id", "px", "py", "pz", "vx", "vy", "vz", "time"] {
            assert!(json.contains(&format!("\"{}\"", key)));
        }
    }

    #[test]
    fn test_states_payload_through_envelope() {
        let payload = StatesPayload {
            states: vec![StateRecord {
                entity_id: 7,
                px: 6_771_000.0,
                time: 60.0,
                ..Default::default()
            }],
        };
        let env = Envelope::with_payload(Kind::SyncResponse, &payload, 60.0).unwrap();
        let decoded = Envelope::decode(&env.encode().unwrap());
        let parsed: StatesPayload = decoded.parse_payload();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_partial_payload_fills_defaults() {
        let parsed: StateRecord = serde_json::from_str(r#"{"entity_id":9,"px":5.0}"#).unwrap();
        assert_eq!(parsed.entity_id, 9);
        assert_eq!(parsed.px, 5.0);
        assert_eq!(parsed.vy, 0.0);
    }

    #[test]
    fn test_radius_and_speed() {
        let record = StateRecord {
            px: 3.0,
            py: 4.0,
            vx: 6.0,
            vy: 8.0,
            ..Default::default()
        };
        assert_eq!(record.radius(), 5.0);
        assert_eq!(record.speed(), 10.0);
    }
}
