// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Text protocol spoken by the BPRAM counting wrapper.
//!
//! The wrapper's stdout and stderr are joined into one stream. Once the
//! filesystem is mounted it prints [`READY_LINE`]; when it is terminated it
//! prints a summary of the form `pin: <n> bytes written to BPRAM`, where `n`
//! counts every byte written to the image since the wrapper started.

use std::io::{self, BufRead};

/// Exact line (including the newline) announcing that the mount is live.
pub const READY_LINE: &str = "BPFS running\n";

const SUMMARY_PREFIX: &str = "pin: ";
const SUMMARY_SUFFIX: &str = " bytes written to BPRAM";

/// Result of waiting for the readiness line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The readiness line arrived after `skipped` other lines.
    Ready { skipped: usize },
    /// The stream hit EOF first; `last_line` is the final line seen, if any.
    Closed { last_line: Option<String> },
}

/// Block on `reader` until the readiness line or EOF.
///
/// Lines are compared as raw bytes; wrapper output need not be UTF-8.
pub fn await_ready<R: BufRead>(reader: &mut R) -> io::Result<Readiness> {
    let mut line = Vec::new();
    let mut skipped = 0;
    let mut last_line = None;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(Readiness::Closed { last_line });
        }
        if line == READY_LINE.as_bytes() {
            return Ok(Readiness::Ready { skipped });
        }

        let text = String::from_utf8_lossy(&line).trim_end().to_string();
        tracing::trace!(line = %text, "Wrapper output");
        skipped += 1;
        last_line = Some(text);
    }
}

/// Find the byte count in the wrapper's shutdown summary.
///
/// Returns the first well-formed summary line in `output`.
pub fn parse_summary(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        if !line.starts_with(SUMMARY_PREFIX) || !line.ends_with(SUMMARY_SUFFIX) {
            return None;
        }
        line.split_whitespace().nth(1)?.parse().ok()
    })
}
