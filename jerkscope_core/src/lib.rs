//! JerkScope Core - streaming jerk extraction for VR motion telemetry
//!
//! Turns newline-delimited EchoVR frames into an ordered table of
//! `(group_id, entity_id, time, jerk)` rows:
//! 1. **Frame Decoder**: one JSON line → one [`Frame`], bad lines are skipped
//! 2. **Kinematic State Tracker**: per-(group, entity) finite differencing
//! 3. **Sinks**: the finished table goes to Parquet (or JSON Lines)

pub mod error;
pub mod frame;
pub mod kinematics;
pub mod pipeline;
pub mod sink;

// Re-export key types for convenience
pub use error::{DecodeError, PipelineError, SinkError};
pub use frame::{decode_frame, EntityObservation, Frame, Grouping, WireVector};
pub use kinematics::{JerkRecord, KinematicTracker, TrackedEntityKey, TrackedEntityState};
pub use pipeline::{JerkPipeline, PipelineConfig, PipelineReport, PipelineStats};
pub use sink::{export, ExportOutcome, JsonLinesSink, ParquetSink, RecordSink, SinkConfig, SinkFormat};
