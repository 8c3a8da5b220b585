//! The streaming ETL driver: lines → frames → tracker → records.
//!
//! Single consumer, strictly in arrival order. The only blocking point is
//! the read of the next line from the upstream producer.

use serde::Serialize;
use std::io::BufRead;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::frame::decode_frame;
use crate::kinematics::{JerkRecord, KinematicTracker};

/// Runtime configuration for [`JerkPipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Log a progress line every N decoded frames (None = off)
    pub log_every: Option<u64>,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub lines_read: u64,
    pub blank_lines: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub observations: u64,
    pub tracked_keys: usize,
    pub records_emitted: usize,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Records in emission order
    pub records: Vec<JerkRecord>,
    pub stats: PipelineStats,
}

/// Owns one tracker and drives it over one input stream.
pub struct JerkPipeline {
    tracker: KinematicTracker,
    config: PipelineConfig,
    stats: PipelineStats,
    records: Vec<JerkRecord>,
}

impl JerkPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            tracker: KinematicTracker::new(),
            config,
            stats: PipelineStats::default(),
            records: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PipelineConfig::default())
    }

    /// Feeds one raw line (terminator already stripped).
    ///
    /// Blank lines are skipped before decoding. A line that fails to decode
    /// is logged and dropped; it never touches tracker state.
    pub fn push_line(&mut self, line: &[u8]) {
        self.stats.lines_read += 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            self.stats.blank_lines += 1;
            return;
        }

        let frame = match decode_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!("Skipping line {}: {}", self.stats.lines_read, e);
                return;
            }
        };

        self.stats.frames_decoded += 1;
        self.stats.observations += frame.observation_count() as u64;
        self.tracker.ingest_frame(&frame, &mut self.records);

        if let Some(every) = self.config.log_every.filter(|n| *n > 0) {
            if self.stats.frames_decoded % every == 0 {
                info!(
                    "Processed {} frames | keys={} | records={}",
                    self.stats.frames_decoded,
                    self.tracker.key_count(),
                    self.records.len()
                );
            }
        }
    }

    /// Consumes `reader` to end of input.
    ///
    /// An I/O failure aborts the run; records gathered so far are dropped
    /// together with the pipeline.
    pub fn run<R: BufRead>(mut self, mut reader: R) -> Result<PipelineReport, PipelineError> {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| PipelineError::StreamRead {
                    line: self.stats.lines_read + 1,
                    source,
                })?;
            if n == 0 {
                break;
            }

            self.push_line(strip_terminator(&buf));
        }

        Ok(self.finish())
    }

    /// Closes the run and returns the accumulated output.
    pub fn finish(mut self) -> PipelineReport {
        self.stats.tracked_keys = self.tracker.key_count();
        self.stats.records_emitted = self.records.len();

        info!(
            "Stream complete: {} lines, {} frames, {} skipped, {} keys, {} records",
            self.stats.lines_read,
            self.stats.frames_decoded,
            self.stats.decode_failures,
            self.stats.tracked_keys,
            self.stats.records_emitted
        );

        PipelineReport {
            records: self.records,
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn tracker(&self) -> &KinematicTracker {
        &self.tracker
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
