// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Report output for benchmark results.
//!
//! Text output is one line per case:
//!
//! ```text
//! Benchmark create: 90 bytes (6 = 7%)
//! Benchmark empty: 0 bytes (0)
//! ```
//!
//! The `Benchmark <name>: ` prefix is flushed before the case runs so progress
//! is visible while a slow case is measured. JSON output is one object per
//! line, written only once the case has finished.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clap::ValueEnum;
use thiserror::Error;

use crate::catalog::BenchmarkCase;
use crate::metrics::{CaseRecord, CaseResult};

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Trace parser {program} failed: {reason}")]
    TraceParser { program: String, reason: String },
}

/// Output format of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Writes one report entry per case to `out`.
pub struct Reporter<W: Write> {
    out: W,
    format: ReportFormat,
    trace_parser: Option<PathBuf>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self {
            out,
            format,
            trace_parser: None,
        }
    }

    /// Run `parser` over each case's trace log after reporting it.
    pub fn with_trace_parser(mut self, parser: impl Into<PathBuf>) -> Self {
        self.trace_parser = Some(parser.into());
        self
    }

    /// Announce a case about to run.
    pub fn begin(&mut self, case: &BenchmarkCase) -> Result<(), ReporterError> {
        if self.format == ReportFormat::Text {
            write!(self.out, "Benchmark {}: ", case.name)?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Report a finished case.
    pub fn record(&mut self, result: &CaseResult) -> Result<(), ReporterError> {
        match self.format {
            ReportFormat::Text => {
                write!(self.out, "{} bytes ({}", result.bytes_written, result.delta())?;
                if let Some(percent) = result.percent_overhead() {
                    write!(self.out, " = {}%", percent)?;
                }
                writeln!(self.out, ")")?;
            }
            ReportFormat::Json => {
                serde_json::to_writer(&mut self.out, &CaseRecord::from(result))?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Feed a case's trace log to the trace parser and copy its output.
    pub fn parse_trace(&mut self, trace_log: &Path) -> Result<(), ReporterError> {
        let Some(parser) = &self.trace_parser else {
            return Ok(());
        };
        let program = parser.display().to_string();

        let trace = File::open(trace_log).map_err(|e| ReporterError::TraceParser {
            program: program.clone(),
            reason: format!("cannot open {}: {}", trace_log.display(), e),
        })?;

        tracing::debug!(parser = %program, trace_log = %trace_log.display(), "Parsing trace");

        let output = Command::new(parser)
            .stdin(Stdio::from(trace))
            .output()
            .map_err(|e| ReporterError::TraceParser {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ReporterError::TraceParser {
                program,
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        self.out.write_all(&output.stdout)?;
        self.out.flush()?;
        Ok(())
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
