//! The Frame Decoder - one JSON line in, one [`Frame`] out.
//!
//! Field names follow the EchoVR session API (`sessionid`, `game_clock`,
//! `teams[].players[]`, `userid`). The generic names (`group_id`, `time`,
//! `groupings[].entities[]`, `entity_id`) are accepted as aliases so that
//! non-EchoVR producers can feed the same pipeline. A line carrying both
//! spellings of one field is a duplicate-field decode failure.

use nalgebra::Vector3;
use serde::{Deserialize, Deserializer};

use crate::error::DecodeError;

// ============================================================================
// WIRE VECTOR
// ============================================================================

/// A 3D vector as it appears on the wire: `{"x": .., "y": .., "z": ..}`.
///
/// nalgebra serializes `Vector3` as a bare array, so this type bridges the
/// object form into `Vector3<f64>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct WireVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<WireVector> for Vector3<f64> {
    fn from(v: WireVector) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

// ============================================================================
// FRAME
// ============================================================================

/// One observed entity inside a frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityObservation {
    /// Entity identifier, unique within its group
    #[serde(rename = "userid", alias = "entity_id")]
    pub entity_id: String,

    /// Position (defaults to the origin when the producer omits it)
    #[serde(default = "origin", deserialize_with = "wire_vector")]
    pub position: Vector3<f64>,

    /// Velocity, the only kinematic input the tracker differentiates
    #[serde(deserialize_with = "wire_vector")]
    pub velocity: Vector3<f64>,
}

/// A team grouping; order of `entities` is preserved as received.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Grouping {
    #[serde(rename = "players", alias = "entities", default, deserialize_with = "null_as_empty")]
    pub entities: Vec<EntityObservation>,
}

/// One observation batch: every entity of one group at one reported time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Frame {
    /// Session / context identifier scoping entity ids
    #[serde(rename = "sessionid", alias = "group_id")]
    pub group_id: String,

    /// Reported game time. Expected to increase, never enforced.
    #[serde(rename = "game_clock", alias = "time")]
    pub time: f64,

    #[serde(rename = "teams", alias = "groupings", default, deserialize_with = "null_as_empty")]
    pub groupings: Vec<Grouping>,
}

impl Frame {
    /// Iterates all observations in grouping order, then entity order.
    pub fn observations(&self) -> impl Iterator<Item = &EntityObservation> {
        self.groupings.iter().flat_map(|g| g.entities.iter())
    }

    /// Total number of entity observations in this frame.
    pub fn observation_count(&self) -> usize {
        self.groupings.iter().map(|g| g.entities.len()).sum()
    }
}

/// Decodes one input line (without its terminator) into a [`Frame`].
///
/// Pure function of its input. Invalid UTF-8, malformed JSON, wrong field
/// types and missing required fields all come back as [`DecodeError`].
pub fn decode_frame(line: &[u8]) -> Result<Frame, DecodeError> {
    Ok(serde_json::from_slice(line)?)
}

fn origin() -> Vector3<f64> {
    Vector3::zeros()
}

/// Reads a `{x, y, z}` object into `Vector3<f64>`.
fn wire_vector<'de, D: Deserializer<'de>>(d: D) -> Result<Vector3<f64>, D::Error> {
    WireVector::deserialize(d).map(Vector3::from)
}

/// Reads an explicit `null` list as empty, like a missing key.
fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}
