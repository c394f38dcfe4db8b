use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::config::{MAX_SEED, MAX_SIZE, MAX_YEAR, MIN_YEAR};
use crate::core::{GeneratorConfig, Mode, RandomizationContext, SchemaRegistry, run_pipeline};
use crate::io::{load_dataset, stage_json, stage_output};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taxsynth",
    about = "Adds random amounts to most variables in the puf.csv input file and writes the \
             randomized, sampled CSV-formatted input file to xYY.csv"
)]
pub struct Cli {
    #[arg(
        value_name = "YEAR",
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Tax year; must be in [2013,2023] range"
    )]
    pub year: i64,
    #[arg(
        value_name = "SEED",
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Random-number seed; must be in [1,999999999] range"
    )]
    pub seed: i64,
    #[arg(
        value_name = "SIZE",
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Sample size; must be in [1,100000] range"
    )]
    pub size: i64,
    #[arg(long, default_value = "puf.csv", help = "Source CSV file")]
    pub input: PathBuf,
    #[arg(long, default_value = ".", help = "Directory the xYY.csv file is written to")]
    pub output_dir: PathBuf,
    #[arg(
        long,
        help = "Skip randomization and sampling; output aggregates match the source"
    )]
    pub pass_through: bool,
    #[arg(long, help = "Write a JSON run summary with per-column sums to this path")]
    pub summary: Option<PathBuf>,
    #[arg(long, help = "Log per-variable randomization details")]
    pub trace: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub tax_year: i32,
    pub seed: u64,
    pub requested_size: usize,
    pub mode: Mode,
    pub output_file: PathBuf,
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped_columns: usize,
    pub randomized_columns: usize,
    pub skipped_columns: usize,
    pub column_sums: BTreeMap<String, f64>,
}

/// Checks each positional argument against its range independently and
/// returns every violation.
pub fn validate_args(cli: &Cli) -> std::result::Result<RandomizationContext, Vec<String>> {
    let mut errors = Vec::new();
    if !(MIN_YEAR..=MAX_YEAR).contains(&cli.year) {
        errors.push(format!(
            "YEAR {} not in [{MIN_YEAR},{MAX_YEAR}] range",
            cli.year
        ));
    }
    if !(1..=MAX_SEED).contains(&cli.seed) {
        errors.push(format!("SEED {} not in [1,{MAX_SEED}] range", cli.seed));
    }
    if !(1..=MAX_SIZE).contains(&cli.size) {
        errors.push(format!("SIZE {} not in [1,{MAX_SIZE}] range", cli.size));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    // ranges above make these conversions lossless
    Ok(RandomizationContext {
        tax_year: cli.year as i32,
        seed: cli.seed as u64,
        sample_size: cli.size as usize,
        mode: if cli.pass_through {
            Mode::PassThrough
        } else {
            Mode::Randomize
        },
    })
}

/// Loads, transforms and writes the dataset and the optional summary. Both
/// files are staged before either is persisted, and the output is removed
/// again if the summary cannot be moved into place.
pub fn run(cli: &Cli, ctx: &RandomizationContext) -> Result<RunSummary> {
    let registry = SchemaRegistry::embedded().context("failed to load schema registry")?;
    let config = GeneratorConfig::for_mode(ctx.mode);

    let source = load_dataset(&cli.input)?;
    let rows_in = source.row_count();
    let outcome = run_pipeline(source, &config, &registry, ctx)?;

    let staged = stage_output(&outcome.dataset, &cli.output_dir, ctx.tax_year)?;
    let output_file = staged.path().to_path_buf();
    let summary = RunSummary {
        tax_year: ctx.tax_year,
        seed: ctx.seed,
        requested_size: ctx.sample_size,
        mode: ctx.mode,
        output_file,
        rows_in,
        rows_out: outcome.dataset.row_count(),
        dropped_columns: outcome.report.dropped.len(),
        randomized_columns: outcome.report.randomized.len(),
        skipped_columns: outcome.report.skipped.len(),
        column_sums: outcome.dataset.column_sums(),
    };
    let staged_summary = match &cli.summary {
        Some(path) => Some(stage_json(&summary, path)?),
        None => None,
    };

    staged.persist()?;
    if let Some(staged_summary) = staged_summary {
        if let Err(e) = staged_summary.persist() {
            if let Err(rm) = fs::remove_file(&summary.output_file) {
                warn!(path = %summary.output_file.display(), error = %rm, "failed to remove output");
            }
            return Err(e);
        }
    }
    info!(
        output = %summary.output_file.display(),
        rows = summary.rows_out,
        "done"
    );
    Ok(summary)
}

/// Validates, runs, and reports. Returns the process exit code.
pub fn execute(cli: &Cli) -> i32 {
    let ctx = match validate_args(cli) {
        Ok(ctx) => ctx,
        Err(errors) => {
            for msg in errors {
                eprintln!("ERROR: {msg}");
            }
            eprintln!("USAGE: taxsynth --help");
            return 1;
        }
    };

    match run(cli, &ctx) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            1
        }
    }
}
