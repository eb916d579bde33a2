// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MicrobenchError, MicrobenchResult};

/// Name of the image-backed (instrumented) filesystem backend.
pub const IMAGE_BACKEND: &str = "bpfs";

/// Minimum backing image size: 1 MiB
const MIN_IMAGE_MB: u64 = 1;
/// Maximum backing image size: 4 GiB
const MAX_IMAGE_MB: u64 = 4096;
/// Default backing image size: 32 MiB
pub const DEFAULT_IMAGE_MB: u64 = 32;

/// Validated kernel filesystem type, e.g. `ext4`.
/// Used to build `mkfs.<name>`, so only alphanumerics and underscores are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FsName(String);

impl FsName {
    /// Create a new FsName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "fs_name",
                value: name,
                reason: "Filesystem type cannot be empty".to_string(),
            });
        }

        if name.len() > 32 {
            return Err(ConfigError::InvalidFieldValue {
                field: "fs_name",
                value: name.clone(),
                reason: format!("Filesystem type too long: {} chars (max 32)", name.len()),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidFieldValue {
                field: "fs_name",
                value: name,
                reason: "Filesystem type must contain only ASCII alphanumerics and underscores"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `mkfs.<name>` understands `-q` (the ext family does).
    pub fn has_quiet_mkfs(&self) -> bool {
        matches!(self.0.as_str(), "ext2" | "ext3" | "ext4")
    }
}

impl fmt::Display for FsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FsName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FsName> for String {
    fn from(name: FsName) -> Self {
        name.0
    }
}

/// Validated backing image size in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ImageSize(u64);

impl ImageSize {
    /// Create a new ImageSize with bounds validation.
    pub fn from_mb(mb: u64) -> Result<Self, ConfigError> {
        if !(MIN_IMAGE_MB..=MAX_IMAGE_MB).contains(&mb) {
            return Err(ConfigError::InvalidFieldValue {
                field: "image.size_mb",
                value: mb.to_string(),
                reason: format!("must be between {} and {}", MIN_IMAGE_MB, MAX_IMAGE_MB),
            });
        }
        Ok(Self(mb))
    }

    /// Get the size in MiB.
    pub fn megabytes(&self) -> u64 {
        self.0
    }

    /// Get the size in bytes.
    pub fn bytes(&self) -> u64 {
        self.0 * 1024 * 1024
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self(DEFAULT_IMAGE_MB)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MiB", self.0)
    }
}

impl TryFrom<u64> for ImageSize {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_mb(value)
    }
}

impl From<ImageSize> for u64 {
    fn from(size: ImageSize) -> Self {
        size.0
    }
}

/// Which filesystem backend a run measures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// BPFS on a temporary image, counted by the instrumentation wrapper.
    Image,
    /// A kernel filesystem on a block device, counted via /proc/diskstats.
    Kernel { fs: FsName, device: PathBuf },
}

impl BackendSelection {
    /// Resolve the `-t FS` / `-d DEV` command line pair.
    ///
    /// Any filesystem other than [`IMAGE_BACKEND`] needs a backing device.
    pub fn from_args(fs: &str, device: Option<&Path>) -> MicrobenchResult<Self> {
        if fs == IMAGE_BACKEND {
            if let Some(device) = device {
                tracing::warn!(
                    device = %device.display(),
                    "Ignoring backing device, {} uses a temporary image",
                    IMAGE_BACKEND
                );
            }
            return Ok(Self::Image);
        }

        let fs = FsName::new(fs).map_err(|e| MicrobenchError::Argument {
            message: e.to_string(),
        })?;
        let device = device.ok_or_else(|| MicrobenchError::Argument {
            message: format!("Must provide a backing device for {}", fs),
        })?;

        Ok(Self::Kernel {
            fs,
            device: device.to_path_buf(),
        })
    }

    /// Backend name for logs and reports.
    pub fn name(&self) -> &str {
        match self {
            Self::Image => IMAGE_BACKEND,
            Self::Kernel { fs, .. } => fs.as_str(),
        }
    }
}

/// Bytes written to the backing store between a mount and its unmount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WriteMeasurement {
    bytes_written: u64,
}

impl WriteMeasurement {
    pub fn new(bytes_written: u64) -> Self {
        Self { bytes_written }
    }

    /// Get the number of bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl fmt::Display for WriteMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.bytes_written)
    }
}
