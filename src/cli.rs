//! Command-line interface: argument parsing, input loading and output.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::export;
use crate::model::{PipelineConfig, PipelineReport, Sample, SmoothingMode, YAxisScale};
use crate::pipeline::Pipeline;
use crate::text_summary::build_text_summary;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "latency-trends",
    version,
    about = "Smooth provider latency exports and aggregate daily candlesticks"
)]
pub struct Cli {
    /// Input file with warehouse rows (JSON array or JSON lines), '-' for stdin
    #[arg(long, default_value = "-")]
    pub input: String,

    /// Smoothing mode: index or time
    #[arg(long, default_value = "index")]
    pub smoothing: String,

    /// Fraction of each series per smoothing window in index mode, in (0, 1]
    #[arg(long, default_value_t = 0.05)]
    pub frac: f64,

    /// Trailing window length in time mode (e.g. 6h, 1day)
    #[arg(long, default_value = "1day")]
    pub time_window: humantime::Duration,

    /// Y-axis scale hint carried into the report: linear, log, symlog or sqrt
    #[arg(long, default_value = "linear")]
    pub y_axis_scale: String,

    /// Input field holding the sample timestamp
    #[arg(long, default_value = "timestamp")]
    pub timestamp_field: String,

    /// Input field holding the provider name
    #[arg(long, default_value = "provider_api_name")]
    pub provider_field: String,

    /// Input field holding the latency value
    #[arg(long, default_value = "latency")]
    pub latency_field: String,

    /// Print the full report as JSON instead of the text summary
    #[arg(long)]
    pub json: bool,

    /// Write smoothed.csv, daily.csv and anomalies.csv into this directory
    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

/// Build a pipeline config from CLI arguments.
pub fn build_config(args: &Cli) -> Result<PipelineConfig> {
    let smoothing: SmoothingMode = args.smoothing.parse().map_err(anyhow::Error::msg)?;
    let y_axis_scale: YAxisScale = args.y_axis_scale.parse().map_err(anyhow::Error::msg)?;

    if !(args.frac > 0.0 && args.frac <= 1.0) {
        bail!("--frac must be in (0, 1], got {}", args.frac);
    }
    let time_window = Duration::from(args.time_window);
    if time_window.is_zero() {
        bail!("--time-window must be positive");
    }

    Ok(PipelineConfig {
        smoothing,
        frac: args.frac,
        time_window,
        y_axis_scale,
    })
}

/// Run the pipeline end to end and print the report.
pub fn run(args: Cli) -> Result<()> {
    let config = build_config(&args)?;
    let raw = read_input(&args.input)?;
    let samples = parse_samples(&raw, &args)?;

    let report = Pipeline::new(config).run(&samples)?;

    handle_exports(&args, &report)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in build_text_summary(&report).lines {
            println!("{line}");
        }
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

/// Parse warehouse rows from a JSON array or JSON-lines text.
fn parse_samples(raw: &str, args: &Cli) -> Result<Vec<Sample>> {
    let rows: Vec<serde_json::Value> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw).context("input is not a valid JSON array")?
    } else {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()
            .context("input is not valid JSON lines")?
    };

    rows.iter()
        .enumerate()
        .map(|(i, row)| sample_from_row(row, args).with_context(|| format!("bad input row {i}")))
        .collect()
}

fn sample_from_row(row: &serde_json::Value, args: &Cli) -> Result<Sample> {
    let ts = row
        .get(args.timestamp_field.as_str())
        .and_then(serde_json::Value::as_str)
        .with_context(|| format!("missing string field '{}'", args.timestamp_field))?;
    let provider = row
        .get(args.provider_field.as_str())
        .and_then(serde_json::Value::as_str)
        .with_context(|| format!("missing string field '{}'", args.provider_field))?;
    let latency = row
        .get(args.latency_field.as_str())
        .and_then(serde_json::Value::as_f64)
        .with_context(|| format!("missing numeric field '{}'", args.latency_field))?;

    Ok(Sample {
        timestamp: parse_timestamp(ts)?,
        provider: provider.to_string(),
        latency,
    })
}

/// Accept RFC 3339 or the warehouse's plain `YYYY-MM-DD HH:MM:SS`, assumed UTC.
fn parse_timestamp(ts: &str) -> Result<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(ts, &Rfc3339) {
        return Ok(parsed.to_offset(UtcOffset::UTC));
    }
    let plain = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(ts, plain)
        .map(PrimitiveDateTime::assume_utc)
        .with_context(|| format!("unparseable timestamp '{ts}'"))
}

/// Write the three CSV exports when `--export-csv` is set.
fn handle_exports(args: &Cli, report: &PipelineReport) -> Result<()> {
    if let Some(dir) = args.export_csv.as_deref() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        write_csv(&dir.join("smoothed.csv"), &export::smoothed_rows(report))?;
        write_csv(&dir.join("daily.csv"), &export::daily_rows(report))?;
        write_csv(&dir.join("anomalies.csv"), &export::anomaly_rows(report))?;
    }
    Ok(())
}

fn write_csv<S: serde::Serialize>(path: &Path, rows: &[S]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
