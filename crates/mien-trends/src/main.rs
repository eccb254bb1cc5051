//! mien-trends: CLI tool for inspecting score trends in an exported history.
//!
//! Reads a JSON array of analysis snapshots (newest first, as the app
//! stores them) and prints the same trend model the results screen
//! shows: the overall-score series inside the window, the breakdown
//! table with deltas, and the cohort of the latest snapshot.
//!
//! # Usage
//!
//! ```text
//! cargo run --bin mien-trends -- [--range 7d|30d|90d] [--json] <HISTORY_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mien_pipeline::{AnalysisSnapshot, AnalyticsModel, TimeRange, compute_analytics_from_snapshots};
use tracing_subscriber::EnvFilter;

/// Score trends for an exported mien analysis history.
///
/// The window is anchored at the newest snapshot, not the current date,
/// so an old export reports the same trends it did when it was saved.
#[derive(Parser)]
#[command(name = "mien-trends", version)]
struct Cli {
    /// Path to the history JSON (an array of snapshots, newest first).
    history_path: PathBuf,

    /// Trend window.
    #[arg(long, default_value_t = TimeRange::Month)]
    range: TimeRange,

    /// Output the trend model as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let json = match std::fs::read_to_string(&cli.history_path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.history_path.display());
            return ExitCode::FAILURE;
        }
    };
    let history: Vec<AnalysisSnapshot> = match serde_json::from_str(&json) {
        Ok(history) => history,
        Err(e) => {
            eprintln!("Error parsing {}: {e}", cli.history_path.display());
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(snapshots = history.len(), range = %cli.range, "computing trends");

    let model = compute_analytics_from_snapshots(&history, cli.range);

    if cli.json {
        match serde_json::to_string_pretty(&model) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing trends: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", render(&model, cli.range));
    }

    ExitCode::SUCCESS
}

/// Human-readable report.
fn render(model: &AnalyticsModel, range: TimeRange) -> String {
    let mut out = String::new();
    if model.breakdown_rows.is_empty() {
        out.push_str("No saved analyses.\n");
        return out;
    }

    let _ = writeln!(out, "Overall score, last {range}:");
    for point in &model.series_overall {
        let _ = writeln!(out, "  {:<26} {:>3}", point.t, point.value);
    }
    out.push('\n');

    let width = model
        .breakdown_rows
        .iter()
        .map(|row| row.label.len())
        .max()
        .unwrap_or(0);
    for row in &model.breakdown_rows {
        let _ = writeln!(out, "{:<width$}  {:>10}  {:>5}", row.label, row.value, row.delta);
    }

    if let Some(cohort) = &model.cohort_label {
        let _ = writeln!(out, "\nCohort: {cohort}");
    }
    out
}
