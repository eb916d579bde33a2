// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Write-amplification microbenchmarks
//!
//! Measures how many bytes a filesystem writes to its backing store for
//! single metadata and data operations, and compares the count with the
//! minimum a single-copy/single-pointer copy-on-write design must write.
//!
//! # Components
//!
//! - **Catalog**: every operation under test with its optimal byte cost
//! - **Harness**: format, prepare, measured mount, run, unmount
//! - **Reporter**: text or JSON-lines output, optional trace parsing

pub mod catalog;
pub mod harness;
pub mod metrics;
pub mod reporter;

pub use catalog::{BenchmarkCase, BenchmarkCatalog, Operation};
pub use harness::{BenchmarkHarness, HarnessError, Phase};
pub use metrics::{CaseRecord, CaseResult};
pub use reporter::{ReportFormat, Reporter, ReporterError};
