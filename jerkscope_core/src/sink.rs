//! Output sinks for the jerk feature table.
//!
//! The pipeline hands over the full record sequence once, at end of stream.
//! Sinks nevertheless accept repeated `write_batch` calls (each Parquet batch
//! becomes one or more row groups) and are sealed with `finish`.

use parquet::data_type::{ByteArray, ByteArrayType, DoubleType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SinkError;
use crate::kinematics::JerkRecord;

/// Parquet schema of the feature table. Column order matches [`JerkRecord`].
pub const JERK_SCHEMA: &str = "
    message jerk_record {
        REQUIRED BYTE_ARRAY group_id (UTF8);
        REQUIRED BYTE_ARRAY entity_id (UTF8);
        REQUIRED DOUBLE time;
        REQUIRED DOUBLE jerk;
    }
";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// On-disk format of the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFormat {
    #[default]
    Parquet,
    JsonLines,
}

/// Where and how to persist the records.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output file path (default: `features.parquet`)
    pub path: PathBuf,

    pub format: SinkFormat,

    /// Upper bound on rows per Parquet row group (default: 1M)
    pub max_row_group_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("features.parquet"),
            format: SinkFormat::Parquet,
            max_row_group_size: 1024 * 1024,
        }
    }
}

impl SinkConfig {
    /// Creates the output file and returns a sink for the configured format.
    pub fn open(&self) -> Result<Box<dyn RecordSink>, SinkError> {
        let sink: Box<dyn RecordSink> = match self.format {
            SinkFormat::Parquet => Box::new(ParquetSink::create(&self.path, self.max_row_group_size)?),
            SinkFormat::JsonLines => Box::new(JsonLinesSink::create(&self.path)?),
        };
        Ok(sink)
    }
}

// ============================================================================
// SINK TRAIT
// ============================================================================

/// A columnar (or row) writer for [`JerkRecord`]s.
pub trait RecordSink {
    /// Appends `records` in order. Returns the number of rows written.
    fn write_batch(&mut self, records: &[JerkRecord]) -> Result<usize, SinkError>;

    /// Flushes and seals the artifact. Further writes fail.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Result of handing the record sequence to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// Nothing to write; no artifact was created
    Empty,

    /// All rows persisted
    Written { rows: usize },
}

/// Persists `records` as one batch.
///
/// An empty sequence is not an error: the output file is left untouched and
/// [`ExportOutcome::Empty`] is returned.
pub fn export(records: &[JerkRecord], config: &SinkConfig) -> Result<ExportOutcome, SinkError> {
    if records.is_empty() {
        return Ok(ExportOutcome::Empty);
    }

    let mut sink = config.open()?;
    let rows = sink.write_batch(records)?;
    sink.finish()?;

    Ok(ExportOutcome::Written { rows })
}

fn create_file(path: &Path) -> Result<File, SinkError> {
    File::create(path).map_err(|e| SinkError::create(path, e))
}

fn sealed() -> SinkError {
    SinkError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "sink already finished",
    ))
}

// ============================================================================
// PARQUET
// ============================================================================

/// Writes the four typed columns to a Parquet file.
pub struct ParquetSink {
    writer: Option<SerializedFileWriter<File>>,
    max_row_group_size: usize,
}

impl ParquetSink {
    pub fn create(path: &Path, max_row_group_size: usize) -> Result<Self, SinkError> {
        let file = create_file(path)?;
        let max_row_group_size = max_row_group_size.max(1);

        let schema = Arc::new(parse_message_type(JERK_SCHEMA)?);
        let props = Arc::new(
            WriterProperties::builder()
                .set_max_row_group_size(max_row_group_size)
                .build(),
        );

        Ok(Self {
            writer: Some(SerializedFileWriter::new(file, schema, props)?),
            max_row_group_size,
        })
    }
}

impl RecordSink for ParquetSink {
    fn write_batch(&mut self, records: &[JerkRecord]) -> Result<usize, SinkError> {
        let writer = self.writer.as_mut().ok_or_else(sealed)?;

        for chunk in records.chunks(self.max_row_group_size) {
            let mut row_group = writer.next_row_group()?;
            let mut column_index = 0;

            while let Some(mut column) = row_group.next_column()? {
                match column_index {
                    0 | 1 => {
                        let values: Vec<ByteArray> = chunk
                            .iter()
                            .map(|r| {
                                let s = if column_index == 0 { &r.group_id } else { &r.entity_id };
                                ByteArray::from(s.as_str())
                            })
                            .collect();
                        column.typed::<ByteArrayType>().write_batch(&values, None, None)?;
                    }
                    _ => {
                        let values: Vec<f64> = chunk
                            .iter()
                            .map(|r| if column_index == 2 { r.time } else { r.jerk })
                            .collect();
                        column.typed::<DoubleType>().write_batch(&values, None, None)?;
                    }
                }
                column.close()?;
                column_index += 1;
            }

            row_group.close()?;
        }

        Ok(records.len())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

// ============================================================================
// JSON LINES
// ============================================================================

/// One JSON object per record, for tooling without Parquet support.
pub struct JsonLinesSink {
    out: Option<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self {
            out: Some(BufWriter::new(create_file(path)?)),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write_batch(&mut self, records: &[JerkRecord]) -> Result<usize, SinkError> {
        let out = self.out.as_mut().ok_or_else(sealed)?;
        for record in records {
            serde_json::to_writer(&mut *out, record)?;
            out.write_all(b"\n")?;
        }
        Ok(records.len())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }
}
