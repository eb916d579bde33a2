// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark harness driving cases through a filesystem adapter.
//!
//! Every case gets a freshly formatted filesystem. An optional prepare step
//! runs in its own mount whose writes are discarded; the measured window is a
//! second mount around the case's `run` step only.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use microbench_core::{AdapterError, FilesystemAdapter, WriteMeasurement};
use thiserror::Error;

use crate::catalog::{BenchmarkCase, Operation};
use crate::metrics::CaseResult;
use crate::reporter::{Reporter, ReporterError};

/// Step of a case that touches the mounted filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Run => write!(f, "run"),
        }
    }
}

/// Errors that abort a benchmark run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Benchmark {case} failed during {phase}: {source}")]
    Operation {
        case: &'static str,
        phase: Phase,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Report(#[from] ReporterError),
}

/// Runs benchmark cases against one adapter, strictly in sequence.
pub struct BenchmarkHarness<'a> {
    adapter: &'a mut dyn FilesystemAdapter,
    /// Directory for `pin-<case>.log`; set only while profiling.
    trace_dir: Option<PathBuf>,
}

impl<'a> BenchmarkHarness<'a> {
    pub fn new(adapter: &'a mut dyn FilesystemAdapter) -> Self {
        Self {
            adapter,
            trace_dir: None,
        }
    }

    /// Record a write trace for each case's measured window into `trace_dir`.
    ///
    /// Ignored, with a warning, when the adapter cannot trace.
    pub fn with_profiling(mut self, trace_dir: impl Into<PathBuf>) -> Self {
        if self.adapter.supports_trace_log() {
            self.trace_dir = Some(trace_dir.into());
        } else {
            tracing::warn!(
                backend = self.adapter.name(),
                "Profiling is not supported for this backend, running without traces"
            );
        }
        self
    }

    pub fn is_profiling(&self) -> bool {
        self.trace_dir.is_some()
    }

    /// Trace log location for a case, when profiling.
    pub fn trace_log_path(&self, case: &BenchmarkCase) -> Option<PathBuf> {
        self.trace_dir
            .as_ref()
            .map(|dir| dir.join(format!("pin-{}.log", case.name)))
    }

    /// Measure the bytes written by one case.
    pub fn run_case(&mut self, case: &BenchmarkCase) -> Result<WriteMeasurement, HarnessError> {
        let mount_point = self.adapter.mount_point().to_path_buf();

        self.adapter.format()?;

        if let Some(prepare) = case.prepare {
            self.adapter.mount(None)?;
            self.perform(case, Phase::Prepare, prepare, &mount_point)?;
            let discarded = self.adapter.unmount()?;
            tracing::debug!(
                case = case.name,
                bytes = discarded.bytes_written(),
                "Discarded prepare measurement"
            );
        }

        let trace_log = self.trace_log_path(case);
        self.adapter.mount(trace_log.as_deref())?;
        self.perform(case, Phase::Run, case.run, &mount_point)?;
        let measurement = self.adapter.unmount()?;

        tracing::info!(
            case = case.name,
            backend = self.adapter.name(),
            bytes = measurement.bytes_written(),
            optimal = case.optimal_bytes,
            "Benchmark finished"
        );

        Ok(measurement)
    }

    /// Run `cases` in order, reporting each as it finishes.
    ///
    /// Stops at the first error; cases already reported stay reported.
    pub fn run_all<W: Write>(
        &mut self,
        cases: &[&BenchmarkCase],
        reporter: &mut Reporter<W>,
    ) -> Result<Vec<CaseResult>, HarnessError> {
        let mut results = Vec::with_capacity(cases.len());

        for case in cases {
            reporter.begin(case)?;
            let measurement = self.run_case(case)?;

            let result = CaseResult::new(case, measurement);
            reporter.record(&result)?;

            if let Some(trace_log) = self.trace_log_path(case) {
                reporter.parse_trace(&trace_log)?;
            }

            results.push(result);
        }

        Ok(results)
    }

    /// Run an operation on the mounted filesystem, unmounting on failure.
    fn perform(
        &mut self,
        case: &BenchmarkCase,
        phase: Phase,
        operation: Operation,
        mount_point: &Path,
    ) -> Result<(), HarnessError> {
        if let Err(source) = operation(mount_point) {
            if let Err(e) = self.adapter.unmount() {
                tracing::warn!(
                    case = case.name,
                    phase = %phase,
                    error = %e,
                    "Unmount after failed operation also failed"
                );
            }
            return Err(HarnessError::Operation {
                case: case.name,
                phase,
                source,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BenchmarkCatalog;
    use crate::reporter::ReportFormat;
    use microbench_core::{MountState, StateTransitionError};
    use tempfile::TempDir;

    /// In-memory adapter: counts bytes in regular files under a plain
    /// directory and reports the growth of that total across a mount.
    struct DirectoryAdapter {
        dir: TempDir,
        baseline: Option<u64>,
        traced: Vec<Option<PathBuf>>,
        formats: usize,
        supports_trace: bool,
    }

    impl DirectoryAdapter {
        fn new(supports_trace: bool) -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                baseline: None,
                traced: Vec::new(),
                formats: 0,
                supports_trace,
            }
        }

        fn usage(&self) -> u64 {
            fn walk(path: &Path) -> u64 {
                std::fs::read_dir(path)
                    .unwrap()
                    .map(|entry| {
                        let entry = entry.unwrap();
                        let meta = entry.metadata().unwrap();
                        if meta.is_dir() {
                            walk(&entry.path())
                        } else {
                            meta.len()
                        }
                    })
                    .sum()
            }
            walk(self.dir.path())
        }

        fn invalid(&self, to: &'static str) -> AdapterError {
            AdapterError::InvalidState(StateTransitionError::InvalidTransition {
                backend: "dir".to_string(),
                from: self.state().name(),
                to,
            })
        }
    }

    impl FilesystemAdapter for DirectoryAdapter {
        fn name(&self) -> &str {
            "dir"
        }

        fn mount_point(&self) -> &Path {
            self.dir.path()
        }

        fn state(&self) -> MountState {
            if self.baseline.is_some() {
                MountState::Mounted
            } else {
                MountState::Unmounted
            }
        }

        fn supports_trace_log(&self) -> bool {
            self.supports_trace
        }

        fn format(&mut self) -> Result<(), AdapterError> {
            if self.baseline.is_some() {
                return Err(self.invalid("Unmounted"));
            }
            for entry in std::fs::read_dir(self.dir.path()).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    std::fs::remove_dir_all(path).unwrap();
                } else {
                    std::fs::remove_file(path).unwrap();
                }
            }
            self.formats += 1;
            Ok(())
        }

        fn mount(&mut self, trace_log: Option<&Path>) -> Result<(), AdapterError> {
            if self.baseline.is_some() {
                return Err(self.invalid("Mounted"));
            }
            self.traced.push(trace_log.map(Path::to_path_buf));
            self.baseline = Some(self.usage());
            Ok(())
        }

        fn unmount(&mut self) -> Result<WriteMeasurement, AdapterError> {
            let baseline = self.baseline.take().ok_or_else(|| self.invalid("Unmounted"))?;
            Ok(WriteMeasurement::new(self.usage().saturating_sub(baseline)))
        }
    }

    fn case(name: &str) -> &'static BenchmarkCase {
        BenchmarkCatalog::builtin().get(name).unwrap()
    }

    #[test]
    fn test_prepare_writes_are_discarded() {
        let mut adapter = DirectoryAdapter::new(true);
        let mut harness = BenchmarkHarness::new(&mut adapter);

        // 1 MiB written during prepare, 4 KiB during run.
        let measurement = harness.run_case(case("write_1M_4k")).unwrap();
        assert_eq!(measurement.bytes_written(), 0);

        let measurement = harness.run_case(case("append_2M_4k")).unwrap();
        assert_eq!(measurement.bytes_written(), 4096);

        assert_eq!(adapter.formats, 2);
        assert_eq!(adapter.state(), MountState::Unmounted);
    }

    #[test]
    fn test_each_case_starts_formatted() {
        let mut adapter = DirectoryAdapter::new(true);
        let mut harness = BenchmarkHarness::new(&mut adapter);

        harness.run_case(case("create")).unwrap();
        // Would fail with AlreadyExists on a dirty root.
        harness.run_case(case("mkdir")).unwrap();
        harness.run_case(case("rename_inter")).unwrap();
    }

    #[test]
    fn test_failed_operation_unmounts() {
        let failing = BenchmarkCase {
            name: "failing",
            optimal_bytes: 0,
            prepare: None,
            run: |mnt: &Path| std::fs::remove_file(mnt.join("missing")),
        };

        let mut adapter = DirectoryAdapter::new(true);
        let mut harness = BenchmarkHarness::new(&mut adapter);

        match harness.run_case(&failing).unwrap_err() {
            HarnessError::Operation { case, phase, source } => {
                assert_eq!(case, "failing");
                assert_eq!(phase, Phase::Run);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Operation error, got {:?}", other),
        }
        assert_eq!(adapter.state(), MountState::Unmounted);
    }

    #[test]
    fn test_trace_logs_only_when_profiling() {
        let mut adapter = DirectoryAdapter::new(true);
        {
            let mut harness = BenchmarkHarness::new(&mut adapter);
            harness.run_case(case("chmod")).unwrap();
        }
        assert_eq!(adapter.traced, vec![None, None]);

        adapter.traced.clear();
        {
            let mut harness = BenchmarkHarness::new(&mut adapter).with_profiling("/traces");
            assert!(harness.is_profiling());
            harness.run_case(case("chmod")).unwrap();
        }
        // Prepare mount untraced, measured mount traced.
        assert_eq!(
            adapter.traced,
            vec![None, Some(PathBuf::from("/traces/pin-chmod.log"))]
        );
    }

    #[test]
    fn test_profiling_unsupported() {
        let mut adapter = DirectoryAdapter::new(false);
        let mut harness = BenchmarkHarness::new(&mut adapter).with_profiling("/traces");
        assert!(!harness.is_profiling());
        assert!(harness.trace_log_path(case("create")).is_none());
        harness.run_case(case("create")).unwrap();
        assert_eq!(adapter.traced, vec![None]);
    }

    #[test]
    fn test_run_all_reports_in_order() {
        let mut adapter = DirectoryAdapter::new(true);
        let mut harness = BenchmarkHarness::new(&mut adapter);
        let mut reporter = Reporter::new(Vec::new(), ReportFormat::Text);

        let cases = BenchmarkCatalog::builtin().lookup(&["empty", "append_0B_8B"]);
        let results = harness.run_all(&cases, &mut reporter).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            String::from_utf8(reporter.into_inner()).unwrap(),
            "Benchmark append_0B_8B: 8 bytes (-20 = -71%)\n\
             Benchmark empty: 0 bytes (0)\n"
        );
    }
}
