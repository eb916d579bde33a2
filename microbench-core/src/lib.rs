//! Microbench Core Library
//!
//! Measurement plumbing for the write-amplification microbenchmarks.
//! Provides the filesystem adapters (BPFS image and kernel block device),
//! the mount state machine, configuration parsing, and the wrapper line
//! protocol.

pub mod adapter;
pub mod command;
pub mod config;
pub mod error;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use adapter::{FilesystemAdapter, ImageBackend, KernelBackend, MountPoint};
pub use config::{ConfigLoader, HarnessConfig, ImageConfig, KernelConfig};
pub use error::{
    AdapterError, ConfigError, MicrobenchError, MicrobenchResult, StateTransitionError,
};
pub use state::{MountSession, MountState};
pub use types::{BackendSelection, FsName, ImageSize, WriteMeasurement, IMAGE_BACKEND};
