//! Circular-orbit demo propagator
//!
//! Closed-form Keplerian motion for circular orbits, rotated by inclination
//! around the x-axis. Stands in for the real physics stack in the demo and
//! worker binaries; production deployments plug their own [`Propagator`]
//! implementation in.

use std::collections::HashMap;
use std::f64::consts::TAU;

use simwire::StateRecord;
use tracing::warn;

use crate::worker::Propagator;

/// Earth gravitational parameter, m^3/s^2
pub const MU_EARTH: f64 = 3.986004418e14;

/// Mean Earth radius, m
pub const R_EARTH: f64 = 6_371_000.0;

/// One entity's circular orbit
#[derive(Debug, Clone, Copy)]
pub struct OrbitConfig {
    /// Altitude above the surface, km
    pub altitude_km: f64,
    /// Inclination, degrees
    pub inclination_deg: f64,
    /// Initial phase angle, degrees
    pub initial_phase_deg: f64,
}

/// Propagates entities along configured circular orbits
#[derive(Debug, Default)]
pub struct CircularOrbit {
    orbits: HashMap<u64, OrbitConfig>,
    phases: HashMap<u64, f64>,
}

impl CircularOrbit {
    pub fn new(orbits: HashMap<u64, OrbitConfig>) -> Self {
        Self {
            orbits,
            phases: HashMap::new(),
        }
    }

    /// The four-satellite demo constellation: two at 400 km, two at 800 km
    pub fn constellation() -> Self {
        let configs = [
            (400.0, 0.0, 0.0),
            (400.0, 45.0, 90.0),
            (800.0, 90.0, 180.0),
            (800.0, 30.0, 270.0),
        ];
        let orbits = configs
            .iter()
            .enumerate()
            .map(|(id, &(altitude_km, inclination_deg, initial_phase_deg))| {
                (
                    id as u64,
                    OrbitConfig {
                        altitude_km,
                        inclination_deg,
                        initial_phase_deg,
                    },
                )
            })
            .collect();
        Self::new(orbits)
    }

    /// The configured altitude for an entity, if known
    pub fn altitude_km(&self, entity_id: u64) -> Option<f64> {
        self.orbits.get(&entity_id).map(|cfg| cfg.altitude_km)
    }
}

impl Propagator for CircularOrbit {
    fn advance(&mut self, entity_id: u64, dt: f64, state: &mut StateRecord) {
        let Some(cfg) = self.orbits.get(&entity_id) else {
            warn!(entity_id, "No orbit configured, leaving state unchanged");
            return;
        };

        let a = R_EARTH + cfg.altitude_km * 1000.0;
        let incl = cfg.inclination_deg.to_radians();
        let mean_motion = (MU_EARTH / (a * a * a)).sqrt();
        let v_orb = (MU_EARTH / a).sqrt();

        let phase = self
            .phases
            .entry(entity_id)
            .or_insert_with(|| cfg.initial_phase_deg.to_radians());
        *phase = (*phase + mean_motion * dt) % TAU;
        let theta = *phase;

        // In-plane position and velocity (circular: velocity perpendicular
        // to radius), then rotate by inclination around x
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_i, cos_i) = incl.sin_cos();

        state.px = a * cos_t;
        state.py = a * sin_t * cos_i;
        state.pz = a * sin_t * sin_i;
        state.vx = -v_orb * sin_t;
        state.vy = v_orb * cos_t * cos_i;
        state.vz = v_orb * cos_t * sin_i;
    }
}
