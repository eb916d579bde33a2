// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-case results compared against the optimal write cost.

use serde::{Deserialize, Serialize};

use crate::catalog::BenchmarkCase;
use microbench_core::WriteMeasurement;

/// Measured bytes for one case, next to its theoretical minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub bytes_written: u64,
    pub optimal_bytes: u64,
}

impl CaseResult {
    pub fn new(case: &BenchmarkCase, measurement: WriteMeasurement) -> Self {
        Self {
            name: case.name.to_string(),
            bytes_written: measurement.bytes_written(),
            optimal_bytes: case.optimal_bytes,
        }
    }

    /// Bytes written beyond the optimum; negative if the filesystem beat it.
    pub fn delta(&self) -> i64 {
        self.bytes_written as i64 - self.optimal_bytes as i64
    }

    /// Overhead as a whole percentage of the optimum, truncated toward zero.
    ///
    /// `None` when the optimum is zero.
    pub fn percent_overhead(&self) -> Option<i64> {
        if self.optimal_bytes == 0 {
            return None;
        }
        Some(100 * self.delta() / self.optimal_bytes as i64)
    }
}

/// One JSON-lines report record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    pub bytes_written: u64,
    pub optimal_bytes: u64,
    pub delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_overhead: Option<i64>,
}

impl From<&CaseResult> for CaseRecord {
    fn from(result: &CaseResult) -> Self {
        Self {
            name: result.name.clone(),
            bytes_written: result.bytes_written,
            optimal_bytes: result.optimal_bytes,
            delta: result.delta(),
            percent_overhead: result.percent_overhead(),
        }
    }
}
