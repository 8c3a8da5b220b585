//! The Kinematic State Tracker - per-entity finite differencing.
//!
//! Each `(group, entity)` key runs an independent two-state machine:
//!
//! ```text
//!   (unseen) ──1st obs──► SEEDED ──2nd obs──► ACTIVE ──nth obs──► ACTIVE
//!              no emit            no emit             emit jerk
//! ```
//!
//! Derivatives are raw differences between consecutive samples, NOT divided
//! by elapsed frame time. This assumes uniform frame spacing and is a known
//! approximation: downstream anomaly thresholds are calibrated against it.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::frame::{EntityObservation, Frame};

// ============================================================================
// KEYS & RECORDS
// ============================================================================

/// Composite identity of one kinematic state machine.
///
/// Entity ids are scoped by group: `("s1", "u1")` and `("s2", "u1")` never
/// share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedEntityKey {
    pub group_id: String,
    pub entity_id: String,
}

impl TrackedEntityKey {
    pub fn new(group_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// One output row of the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JerkRecord {
    pub group_id: String,
    pub entity_id: String,
    /// Frame time the jerk sample was observed at
    pub time: f64,
    /// `|a_n - a_{n-1}|`, always >= 0 (NaN if the inputs were NaN)
    pub jerk: f64,
}

// ============================================================================
// PER-KEY STATE MACHINE
// ============================================================================

/// Rolling history for one tracked entity.
///
/// Position is carried for parity with the input schema but never feeds the
/// jerk computation.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedEntityState {
    /// Seen exactly once: a velocity, no acceleration yet
    Seeded {
        last_position: Vector3<f64>,
        last_velocity: Vector3<f64>,
    },

    /// Seen at least twice: has an acceleration sample to diff against
    Active {
        last_position: Vector3<f64>,
        last_velocity: Vector3<f64>,
        last_accel: Vector3<f64>,
    },
}

impl TrackedEntityState {
    /// Creates the state for a first sighting.
    pub fn seed(observation: &EntityObservation) -> Self {
        Self::Seeded {
            last_position: observation.position,
            last_velocity: observation.velocity,
        }
    }

    /// False only between the first and second sighting.
    pub fn has_prior_acceleration(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn last_velocity(&self) -> Vector3<f64> {
        match self {
            Self::Seeded { last_velocity, .. } | Self::Active { last_velocity, .. } => *last_velocity,
        }
    }

    pub fn last_position(&self) -> Vector3<f64> {
        match self {
            Self::Seeded { last_position, .. } | Self::Active { last_position, .. } => *last_position,
        }
    }

    /// Last derived acceleration, if any.
    pub fn last_accel(&self) -> Option<Vector3<f64>> {
        match self {
            Self::Seeded { .. } => None,
            Self::Active { last_accel, .. } => Some(*last_accel),
        }
    }

    /// Advances the machine with a subsequent sighting.
    ///
    /// Always transitions into `Active`. Returns the jerk magnitude only when
    /// the previous state already held an acceleration.
    pub fn advance(&mut self, observation: &EntityObservation) -> Option<f64> {
        let current_accel = observation.velocity - self.last_velocity();
        let jerk = self
            .last_accel()
            .map(|prior_accel| (current_accel - prior_accel).norm());

        *self = Self::Active {
            last_position: observation.position,
            last_velocity: observation.velocity,
            last_accel: current_accel,
        };

        jerk
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// Owns the state store for one stream.
///
/// Nothing is process-global: independent streams need independent
/// trackers. Memory grows with the number of distinct keys seen and is
/// never reclaimed while the tracker lives.
///
/// States are stored group → entity so that lookups for known keys borrow
/// the frame's strings; owned ids are only created when seeding or emitting.
#[derive(Debug, Default)]
pub struct KinematicTracker {
    groups: HashMap<String, HashMap<String, TrackedEntityState>>,
    key_count: usize,
}

impl KinematicTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one observation for `group_id` at `time`.
    ///
    /// Returns a record only for the third and later sightings of a key.
    pub fn observe(
        &mut self,
        group_id: &str,
        time: f64,
        observation: &EntityObservation,
    ) -> Option<JerkRecord> {
        if !self.groups.contains_key(group_id) {
            self.groups.insert(group_id.to_string(), HashMap::new());
        }
        let entities = self.groups.get_mut(group_id)?;

        match entities.get_mut(observation.entity_id.as_str()) {
            None => {
                debug!("Seeded {}/{}", group_id, observation.entity_id);
                entities.insert(observation.entity_id.clone(), TrackedEntityState::seed(observation));
                self.key_count += 1;
                None
            }
            Some(state) => state.advance(observation).map(|jerk| JerkRecord {
                group_id: group_id.to_string(),
                entity_id: observation.entity_id.clone(),
                time,
                jerk,
            }),
        }
    }

    /// Fans a frame out over its entities in grouping order, then entity
    /// order, appending emitted records to `out`.
    ///
    /// Returns the number of records appended.
    pub fn ingest_frame(&mut self, frame: &Frame, out: &mut Vec<JerkRecord>) -> usize {
        let before = out.len();
        for observation in frame.observations() {
            if let Some(record) = self.observe(&frame.group_id, frame.time, observation) {
                out.push(record);
            }
        }
        out.len() - before
    }

    /// Convenience wrapper around [`ingest_frame`](Self::ingest_frame).
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<JerkRecord> {
        let mut out = Vec::new();
        self.ingest_frame(frame, &mut out);
        out
    }

    /// Current state for a key, if it has been seen.
    pub fn state(&self, key: &TrackedEntityKey) -> Option<&TrackedEntityState> {
        self.groups.get(&key.group_id)?.get(&key.entity_id)
    }

    /// Number of distinct keys tracked so far.
    pub fn key_count(&self) -> usize {
        self.key_count
    }
}

// ============================================================================
// TESTS
// ============================================================================
