//! CLI tool to reproject a size-tagged GoTrack trackspoints dataset.
//!
//! Usage:
//!   gotrack-transform <SIZE_TAG>
//!   gotrack-transform --schedule streaming --timings <SIZE_TAG>
//!
//! Reads `<data-dir>/trackspoints_size_<SIZE_TAG>.csv` and writes
//! `<data-dir>/trackspoints_transformed_size_<SIZE_TAG>.csv`. Exits with 0 on
//! success and 1 on any usage, I/O, setup or pipeline failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use gotrack::io::DEFAULT_DATA_DIR;
use gotrack::{DatasetPaths, HeaderPolicy, Pipeline, PipelineConfig, RecoveryMode, Schedule};
use tracing_subscriber::EnvFilter;

/// Reproject GoTrack trackpoints into ID,LATITUDE,LONGITUDE records.
#[derive(Parser, Debug)]
#[command(name = "gotrack-transform", version)]
struct Cli {
    /// Dataset size tag used to build the input and output file names
    size_tag: String,

    /// Directory holding the size-tagged datasets
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Lane schedule: phased or streaming
    #[arg(long, default_value = "phased")]
    schedule: Schedule,

    /// Malformed record handling: strict, lenient or permissive
    #[arg(long, default_value = "strict")]
    recovery: RecoveryMode,

    /// First record handling: absent, skip or rewrite
    #[arg(long, default_value = "absent")]
    header: HeaderPolicy,

    /// Print "tag, scan_secs, transform_secs, total_secs" after a successful run
    #[arg(long)]
    timings: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return ExitCode::SUCCESS;
        },
        Err(e) => {
            // Usage errors go to stdout with status 1, like every other failure.
            print!("{}", e.render());
            return ExitCode::FAILURE;
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            println!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let paths = DatasetPaths::from_size_tag(&cli.data_dir, &cli.size_tag)?;
    let config = PipelineConfig {
        schedule: cli.schedule,
        recovery: cli.recovery,
        header: cli.header,
        ..PipelineConfig::default()
    };

    let pipeline = Pipeline::new(config).context("pipeline setup failed")?;
    let report = pipeline
        .transform_file(&paths.input, &paths.output)
        .with_context(|| format!("failed to transform {}", paths.input.display()))?;

    tracing::info!(
        input = %paths.input.display(),
        output = %paths.output.display(),
        records = report.summary.emitted,
        "dataset transformed"
    );
    if cli.timings {
        println!(
            "{}, {:.6}, {:.6}, {:.6}",
            cli.size_tag,
            report.timings.scan.as_secs_f64(),
            report.timings.transform.as_secs_f64(),
            report.timings.total.as_secs_f64(),
        );
    }
    Ok(())
}
