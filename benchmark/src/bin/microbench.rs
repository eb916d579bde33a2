// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI tool to measure write amplification of filesystem operations.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use microbench_benchmark::{BenchmarkCatalog, BenchmarkHarness, ReportFormat, Reporter};
use microbench_core::{adapter, BackendSelection, ConfigLoader, HarnessConfig, IMAGE_BACKEND};
use tracing_subscriber::EnvFilter;

/// Measure bytes written per filesystem operation against the SCSP optimum
#[derive(Parser)]
#[command(name = "microbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File system to measure (bpfs, or a kernel file system such as ext4)
    #[arg(short = 't', value_name = "FS", default_value = IMAGE_BACKEND)]
    fs: String,

    /// Backing block device for a kernel file system
    #[arg(short = 'd', value_name = "DEV")]
    device: Option<PathBuf>,

    /// Profile each run (bpfs only)
    #[arg(short = 'p')]
    profile: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List benchmarks and their optimal costs, then exit
    #[arg(short, long)]
    list: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Benchmarks to run (all if none given)
    #[arg(value_name = "BENCHMARK")]
    benchmarks: Vec<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors.
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = BenchmarkCatalog::builtin();

    if cli.list {
        for case in catalog.all() {
            println!("{:<20} {:>8} bytes", case.name, case.optimal_bytes);
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    let selection = BackendSelection::from_args(&cli.fs, cli.device.as_deref())?;

    let cases = if cli.benchmarks.is_empty() {
        catalog.all().iter().collect()
    } else {
        for name in catalog.unknown(&cli.benchmarks) {
            tracing::warn!(benchmark = name, "Unknown benchmark, skipping");
        }
        catalog.lookup(&cli.benchmarks)
    };

    tracing::info!(
        backend = selection.name(),
        cases = cases.len(),
        profile = cli.profile,
        "Starting benchmarks"
    );

    let mut adapter = adapter::open(&selection, &config)
        .with_context(|| format!("Failed to set up {}", selection.name()))?;

    let mut harness = BenchmarkHarness::new(adapter.as_mut());
    if cli.profile {
        harness = harness.with_profiling(&config.trace_dir);
    }

    let mut reporter = Reporter::new(io::stdout().lock(), cli.format);
    if harness.is_profiling() {
        reporter = reporter.with_trace_parser(&config.image.trace_parser);
    }

    harness.run_all(&cases, &mut reporter)?;

    Ok(())
}
