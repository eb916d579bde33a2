// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every field has a default, so running without a configuration file
//! reproduces the stock layout of a BPFS build tree (`./mkfs.bpfs`,
//! `./bench/bpramcount`, ...). Any invalid field is rejected before the
//! first benchmark runs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, MicrobenchError, MicrobenchResult};
use crate::types::{ImageSize, DEFAULT_IMAGE_MB};

/// Raw image backend configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawImageConfig {
    #[serde(default = "default_mkfs")]
    mkfs: String,
    #[serde(default = "default_counter")]
    counter: String,
    #[serde(default = "default_trace_parser")]
    trace_parser: String,
    #[serde(default = "default_size_mb")]
    size_mb: u64,
    #[serde(default = "default_mount_overhead_bytes")]
    mount_overhead_bytes: u64,
}

fn default_mkfs() -> String {
    "./mkfs.bpfs".to_string()
}

fn default_counter() -> String {
    "./bench/bpramcount".to_string()
}

fn default_trace_parser() -> String {
    "./bench/parse_bpramcount".to_string()
}

fn default_size_mb() -> u64 {
    DEFAULT_IMAGE_MB
}

fn default_mount_overhead_bytes() -> u64 {
    1 // the superblock "valid" flag written on every mount
}

impl Default for RawImageConfig {
    fn default() -> Self {
        Self {
            mkfs: default_mkfs(),
            counter: default_counter(),
            trace_parser: default_trace_parser(),
            size_mb: default_size_mb(),
            mount_overhead_bytes: default_mount_overhead_bytes(),
        }
    }
}

/// Raw kernel backend configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKernelConfig {
    #[serde(default = "default_privilege_command")]
    privilege_command: String,
    #[serde(default = "default_sync_command")]
    sync_command: String,
}

fn default_privilege_command() -> String {
    "sudo".to_string()
}

fn default_sync_command() -> String {
    "sync".to_string()
}

impl Default for RawKernelConfig {
    fn default() -> Self {
        Self {
            privilege_command: default_privilege_command(),
            sync_command: default_sync_command(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    image: RawImageConfig,
    #[serde(default)]
    kernel: RawKernelConfig,
    #[serde(default)]
    trace_dir: Option<String>,
}

/// Validated image backend configuration.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Formatting tool, invoked as `<mkfs> <image>`.
    pub mkfs: PathBuf,
    /// Instrumentation wrapper, invoked as `<counter> -f <image> <mount point>`.
    pub counter: PathBuf,
    /// Trace parser, fed a trace log on stdin when profiling.
    pub trace_parser: PathBuf,
    pub size: ImageSize,
    /// Bytes the wrapper reports for every mount regardless of the workload.
    pub mount_overhead_bytes: u64,
}

/// Validated kernel backend configuration.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Command prefix for mkfs/mount/umount/chmod; `None` runs them directly.
    pub privilege_command: Option<String>,
    pub sync_command: String,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub image: ImageConfig,
    pub kernel: KernelConfig,
    /// Directory receiving `pin-<case>.log` trace files when profiling.
    pub trace_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let raw = RawConfig::default();
        Self {
            image: ImageConfig {
                mkfs: PathBuf::from(raw.image.mkfs),
                counter: PathBuf::from(raw.image.counter),
                trace_parser: PathBuf::from(raw.image.trace_parser),
                size: ImageSize::default(),
                mount_overhead_bytes: raw.image.mount_overhead_bytes,
            },
            kernel: KernelConfig {
                privilege_command: Some(raw.kernel.privilege_command),
                sync_command: raw.kernel.sync_command,
            },
            trace_dir: PathBuf::from("."),
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> MicrobenchResult<HarnessConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| MicrobenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration file");

        Ok(Self::load_string(&content)?)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> Result<HarnessConfig, ConfigError> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Self::validate(RawConfig::default());
        }

        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<HarnessConfig, ConfigError> {
        let image = Self::validate_image(raw.image)?;
        let kernel = Self::validate_kernel(raw.kernel)?;
        let trace_dir = match raw.trace_dir {
            Some(dir) => PathBuf::from(non_empty("trace_dir", dir)?),
            None => PathBuf::from("."),
        };

        Ok(HarnessConfig {
            image,
            kernel,
            trace_dir,
        })
    }

    fn validate_image(raw: RawImageConfig) -> Result<ImageConfig, ConfigError> {
        let size = ImageSize::from_mb(raw.size_mb)?;

        // Overhead larger than the image would turn every measurement into zero.
        if raw.mount_overhead_bytes > size.bytes() {
            return Err(ConfigError::InvalidFieldValue {
                field: "image.mount_overhead_bytes",
                value: raw.mount_overhead_bytes.to_string(),
                reason: format!("exceeds the image size ({})", size),
            });
        }

        Ok(ImageConfig {
            mkfs: PathBuf::from(non_empty("image.mkfs", raw.mkfs)?),
            counter: PathBuf::from(non_empty("image.counter", raw.counter)?),
            trace_parser: PathBuf::from(non_empty("image.trace_parser", raw.trace_parser)?),
            size,
            mount_overhead_bytes: raw.mount_overhead_bytes,
        })
    }

    fn validate_kernel(raw: RawKernelConfig) -> Result<KernelConfig, ConfigError> {
        let privilege_command = match raw.privilege_command.trim() {
            "" => None,
            command => Some(command.to_string()),
        };

        Ok(KernelConfig {
            privilege_command,
            sync_command: non_empty("kernel.sync_command", raw.sync_command)?,
        })
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidFieldValue {
            field,
            value,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value)
}
