//! Custom error types for the microbenchmark harness.
//!
//! Every failure is an explicit enum variant. A failed measurement is never
//! trusted, so none of these errors are retried: they abort the run.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for harness setup and adapter failures.
#[derive(Debug, Error)]
pub enum MicrobenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid arguments: {message}")]
    Argument { message: String },

    // =========================================================================
    // Adapter Errors - Measurement Cannot Be Trusted
    // =========================================================================
    #[error("Filesystem adapter error: {0}")]
    Adapter(#[from] AdapterError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors prevent the harness from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Mount session state errors.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} on backend {backend}")]
    InvalidTransition {
        backend: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Cannot {operation} backend {backend} while {state}")]
    NotPermitted {
        backend: String,
        operation: &'static str,
        state: &'static str,
    },
}

/// Failures of a filesystem backend while formatting, mounting or measuring.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Formatting {backend} failed: {reason}")]
    FormatFailed { backend: String, reason: String },

    #[error("Starting {backend} failed: {reason}")]
    StartFailed { backend: String, reason: String },

    #[error("Stopping {backend} failed: {reason}")]
    StopFailed { backend: String, reason: String },

    #[error("Device {device} not found in /proc/diskstats")]
    DeviceNotFound { device: String },

    #[error("Kernel disk statistics unavailable: {reason}")]
    DiskStatsUnavailable { reason: String },

    #[error(transparent)]
    InvalidState(#[from] StateTransitionError),

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using MicrobenchError.
pub type MicrobenchResult<T> = Result<T, MicrobenchError>;
