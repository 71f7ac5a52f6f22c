//! Equidad CLI
//!
//! Single-command audit entry point for the equidad library.
//!
//! # Usage
//!
//! ```bash
//! # Audit a prediction dataset
//! equidad measure audit.csv
//!
//! # Choose the output file for the disparity table
//! equidad measure audit.csv --save results.csv
//!
//! # Machine-readable report
//! equidad measure audit.csv --json
//! ```

use clap::{Args, Parser, Subcommand};
use equidad::data::read_audit_csv;
use equidad::report::{measure_disparity, ReportConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "equidad",
    version,
    about = "Audit classifier predictions for subgroup disparities"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Suppress progress output
    #[arg(long, global = true)]
    quiet: bool,

    /// Print extra detail
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Measure prediction disparities across subgroups in a dataset
    Measure(MeasureArgs),
}

#[derive(Args)]
struct MeasureArgs {
    /// CSV dataset: one row per individual, with `model prediction`,
    /// `binary outcome`, `model label`, and `sample weights` columns;
    /// remaining columns are demographics
    dataset: PathBuf,

    /// Where to write the pivoted disparity table
    #[arg(long, default_value = "df_fairness.csv")]
    save: PathBuf,

    /// Emit the report as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Ignore the sample-weights column
    #[arg(long)]
    no_weights: bool,

    /// Disable outcome-conditioned deviation weighting
    #[arg(long)]
    no_gamma: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    let result = match cli.command {
        Command::Measure(args) => run_measure(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

fn run_measure(args: MeasureArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Equidad: reading {}", args.dataset.display()),
    );

    let table =
        read_audit_csv(&args.dataset).map_err(|e| format!("Dataset error: {e}"))?;

    log(
        level,
        LogLevel::Verbose,
        &format!("  Individuals: {}", table.len()),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Demographic columns: {}",
            table.attributes().names().join(", ")
        ),
    );

    let mut cfg = ReportConfig::default();
    if args.no_weights {
        cfg = cfg.without_weights();
    }
    if args.no_gamma {
        cfg = cfg.without_gamma();
    }

    let report = measure_disparity(&table, &cfg).map_err(|e| format!("Audit error: {e}"))?;

    if args.json {
        let json = report.to_json().map_err(|e| format!("Export error: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", report.render());
    }

    std::fs::write(&args.save, report.to_csv())
        .map_err(|e| format!("Could not write {}: {e}", args.save.display()))?;
    log(
        level,
        LogLevel::Normal,
        &format!("Saved disparity table to {}", args.save.display()),
    );

    Ok(())
}
