// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Filesystem backends under measurement.
//!
//! A [`FilesystemAdapter`] owns a backing store and a mount point and counts
//! the bytes written to the store between `mount` and `unmount`. Two
//! implementations exist:
//!
//! - [`ImageBackend`]: BPFS on a temporary image, counted by an instrumentation
//!   wrapper process.
//! - [`KernelBackend`]: a kernel filesystem on a block device, counted from
//!   /proc/diskstats.

pub mod diskstats;
mod image;
mod kernel;
pub mod protocol;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use image::ImageBackend;
pub use kernel::KernelBackend;

use crate::config::HarnessConfig;
use crate::error::{AdapterError, MicrobenchResult};
use crate::state::MountState;
use crate::types::{BackendSelection, WriteMeasurement};

/// A filesystem instance that can be formatted, mounted and measured.
///
/// Implementations follow the [`MountState`] machine: `format` only while
/// unmounted, `mount` moves to mounted, `unmount` moves back and yields the
/// bytes written while mounted.
pub trait FilesystemAdapter {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Directory the filesystem is mounted on.
    fn mount_point(&self) -> &Path;

    fn state(&self) -> MountState;

    /// Whether `mount` honours a trace log path.
    fn supports_trace_log(&self) -> bool;

    /// Create an empty filesystem on the backing store.
    fn format(&mut self) -> Result<(), AdapterError>;

    /// Mount the filesystem and start counting writes.
    ///
    /// `trace_log` asks the instrumentation for a fine-grained write trace;
    /// backends without tracing ignore it.
    fn mount(&mut self, trace_log: Option<&Path>) -> Result<(), AdapterError>;

    /// Unmount and return the bytes written since `mount`.
    fn unmount(&mut self) -> Result<WriteMeasurement, AdapterError>;
}

/// Open the adapter for a backend selection.
pub fn open(
    selection: &BackendSelection,
    config: &HarnessConfig,
) -> MicrobenchResult<Box<dyn FilesystemAdapter>> {
    let adapter: Box<dyn FilesystemAdapter> = match selection {
        BackendSelection::Image => Box::new(ImageBackend::create(&config.image)?),
        BackendSelection::Kernel { fs, device } => Box::new(KernelBackend::new(
            fs.clone(),
            device.clone(),
            &config.kernel,
        )?),
    };

    tracing::info!(
        backend = adapter.name(),
        mount_point = %adapter.mount_point().display(),
        "Filesystem adapter ready"
    );

    Ok(adapter)
}

/// Freshly created, empty mount directory, removed again on drop.
///
/// Created in the system temp directory, never under `$HOME` (desktop file
/// managers readdir it). Only an empty directory is removed, so a filesystem
/// that failed to unmount keeps its files.
#[derive(Debug)]
pub struct MountPoint {
    path: PathBuf,
}

impl MountPoint {
    pub fn create() -> Result<Self, AdapterError> {
        let dir = tempfile::Builder::new()
            .prefix("microbench-mnt-")
            .tempdir()
            .map_err(|e| AdapterError::Io {
                context: "creating mount point",
                source: e,
            })?;

        // Recursive cleanup is not safe on a mount point; removal happens in Drop.
        #[allow(deprecated)]
        let path = dir.into_path();

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MountPoint {
    fn drop(&mut self) {
        match fs::remove_dir(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Leaving mount point in place"
            ),
        }
    }
}
