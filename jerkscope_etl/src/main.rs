//! JerkScope ETL CLI
//!
//! Reads EchoVR frames (one JSON object per line) from stdin or a file,
//! derives per-player jerk, and writes the feature table for offline
//! anomaly analysis.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use jerkscope_core::{export, ExportOutcome, JerkPipeline, PipelineConfig, SinkConfig, SinkFormat};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Parquet,
    Jsonl,
}

impl From<Format> for SinkFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Parquet => SinkFormat::Parquet,
            Format::Jsonl => SinkFormat::JsonLines,
        }
    }
}

/// JerkScope streaming jerk extractor
#[derive(Parser, Debug)]
#[command(name = "jerkscope")]
#[command(about = "Derive per-player jerk from EchoVR frame streams", long_about = None)]
struct Args {
    /// Input file of JSON lines (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file
    #[arg(short, long, default_value = "features.parquet")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "parquet")]
    format: Format,

    /// Maximum rows per Parquet row group
    #[arg(long, default_value = "1048576")]
    row_group_size: usize,

    /// Log progress every N decoded frames
    #[arg(long)]
    progress_every: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout for scripting
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging (stderr, so --json output stays clean)
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let pipeline = JerkPipeline::new(PipelineConfig {
        log_every: args.progress_every,
    });
    let report = pipeline.run(reader).context("Error reading input stream")?;

    let sink = SinkConfig {
        path: args.output.clone(),
        format: args.format.into(),
        max_row_group_size: args.row_group_size,
    };
    let outcome = export(&report.records, &sink)
        .with_context(|| format!("Error writing {}", sink.path.display()))?;

    match outcome {
        ExportOutcome::Empty => info!("No records to write"),
        ExportOutcome::Written { rows } => {
            info!("Successfully wrote {} records to {}", rows, sink.path.display())
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "output": sink.path,
            "format": sink.format,
            "result": outcome,
            "stats": report.stats,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("jerkscope-etl-{}.{}", uuid::Uuid::new_v4(), ext))
    }

    fn args(input: &Path, output: &Path, extra: &[&str]) -> Args {
        let mut argv = vec![
            "jerkscope".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    fn write_input(lines: &[&str]) -> PathBuf {
        let path = temp_path("jsonl");
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn frame(t: f64, vx: f64) -> String {
        format!(
            r#"{{"sessionid":"s1","game_clock":{},"teams":[{{"players":[{{"userid":"p1","velocity":{{"x":{},"y":0,"z":0}}}}]}}]}}"#,
            t, vx
        )
    }

    #[test]
    fn test_empty_input_succeeds_without_output() {
        let input = write_input(&[]);
        let output = temp_path("parquet");

        assert!(run(&args(&input, &output, &[])).is_ok());
        assert!(!output.exists());

        std::fs::remove_file(&input).ok();
    }

    #[test]
    fn test_records_written_as_json_lines() {
        let lines: Vec<String> = [(0.0, 0.0), (1.0, 1.0), (2.0, 3.0), (3.0, 6.0)]
            .iter()
            .map(|(t, v)| frame(*t, *v))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(&refs);
        let output = temp_path("jsonl");

        run(&args(&input, &output, &["-f", "jsonl"])).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().count(), 2);

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let lines: Vec<String> = (0..3).map(|t| frame(t as f64, (t * t) as f64)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(&refs);
        let output = temp_path("d").join("missing").join("out.parquet");

        let err = run(&args(&input, &output, &[])).unwrap_err();
        assert!(format!("{:#}", err).contains("Error writing"));

        std::fs::remove_file(&input).ok();
    }

    #[test]
    fn test_unreadable_input_is_fatal() {
        let output = temp_path("parquet");

        // Missing file fails at open
        let missing = temp_path("jsonl");
        assert!(run(&args(&missing, &output, &[])).is_err());

        // A directory opens but fails on read
        let dir = std::env::temp_dir();
        let err = run(&args(&dir, &output, &[])).unwrap_err();
        assert!(format!("{:#}", err).contains("Error reading input stream"));
        assert!(!output.exists());
    }
}
