//! Kernel filesystem on a block device, counted from /proc/diskstats.
//!
//! The device's cumulative write counter is sampled after a `sync` on both
//! sides of the measured window, and before `umount`, so that mkfs, mount and
//! unmount housekeeping is not attributed to the operation.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{diskstats, FilesystemAdapter, MountPoint};
use crate::command::{self, privileged};
use crate::config::KernelConfig;
use crate::error::AdapterError;
use crate::state::{MountSession, MountState};
use crate::types::{FsName, WriteMeasurement};

/// A kernel-mounted filesystem on a block device.
pub struct KernelBackend {
    fs: FsName,
    device: PathBuf,
    /// Name of the device's row in /proc/diskstats.
    device_name: String,
    config: KernelConfig,
    /// Baseline write counter (bytes) while mounted.
    session: MountSession<u64>,
    mount_point: MountPoint,
}

impl KernelBackend {
    pub fn new(fs: FsName, device: PathBuf, config: &KernelConfig) -> Result<Self, AdapterError> {
        let device_name = diskstats::device_name(&device)?;
        let mount_point = MountPoint::create()?;

        tracing::debug!(
            fs = %fs,
            device = %device.display(),
            mount_point = %mount_point.path().display(),
            "Kernel backend created"
        );

        Ok(Self {
            session: MountSession::new(fs.as_str()),
            fs,
            device,
            device_name,
            config: config.clone(),
            mount_point,
        })
    }

    fn privileged<I, S>(&self, program: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        privileged(self.config.privilege_command.as_deref(), program, args)
    }

    /// `mkfs.<fs> <device> [-q]`
    fn mkfs_command(&self) -> Command {
        let mut mkfs = self.privileged(&format!("mkfs.{}", self.fs), [&self.device]);
        if self.fs.has_quiet_mkfs() {
            mkfs.arg("-q");
        }
        mkfs
    }

    /// Flush dirty pages so the device counters reflect every completed write.
    fn sync(&self) -> Result<(), String> {
        command::run_checked(&mut Command::new(&self.config.sync_command))
    }

    fn umount(&self) -> Result<(), String> {
        command::run_checked(&mut self.privileged("umount", [self.mount_point.path()]))
    }

    /// Steps after a successful mount that establish the measurement baseline.
    fn open_window(&self) -> Result<u64, AdapterError> {
        let start_failed = |reason: String| AdapterError::StartFailed {
            backend: self.fs.to_string(),
            reason,
        };

        command::run_checked(&mut self.privileged(
            "chmod",
            [Path::new("777"), self.mount_point.path()],
        ))
        .map_err(start_failed)?;

        // Drain format and mount writes before sampling the baseline.
        self.sync().map_err(start_failed)?;
        diskstats::bytes_written(&self.device_name)
    }
}

impl FilesystemAdapter for KernelBackend {
    fn name(&self) -> &str {
        self.fs.as_str()
    }

    fn mount_point(&self) -> &Path {
        self.mount_point.path()
    }

    fn state(&self) -> MountState {
        self.session.state()
    }

    fn supports_trace_log(&self) -> bool {
        false
    }

    fn format(&mut self) -> Result<(), AdapterError> {
        self.session.require_unmounted("format")?;

        command::run_checked(&mut self.mkfs_command()).map_err(|reason| {
            AdapterError::FormatFailed {
                backend: self.fs.to_string(),
                reason,
            }
        })
    }

    fn mount(&mut self, trace_log: Option<&Path>) -> Result<(), AdapterError> {
        self.session.check_transition(MountState::Mounted)?;

        if let Some(trace_log) = trace_log {
            tracing::debug!(
                backend = %self.fs,
                trace_log = %trace_log.display(),
                "Write tracing not supported, ignoring trace log"
            );
        }

        command::run_checked(&mut self.privileged(
            "mount",
            [self.device.as_path(), self.mount_point.path()],
        ))
        .map_err(|reason| AdapterError::StartFailed {
            backend: self.fs.to_string(),
            reason,
        })?;

        let baseline = match self.open_window() {
            Ok(baseline) => baseline,
            Err(e) => {
                if let Err(reason) = self.umount() {
                    tracing::warn!(backend = %self.fs, reason = %reason, "Cleanup unmount failed");
                }
                return Err(e);
            }
        };

        tracing::debug!(
            backend = %self.fs,
            device = %self.device_name,
            baseline_bytes = baseline,
            "Mounted"
        );

        self.session.mounted(baseline)?;
        Ok(())
    }

    fn unmount(&mut self) -> Result<WriteMeasurement, AdapterError> {
        let baseline = self.session.unmounted()?;

        let stop_failed = |reason: String| AdapterError::StopFailed {
            backend: self.fs.to_string(),
            reason,
        };

        // Sample before umount so its own writes are excluded.
        let sampled = self
            .sync()
            .map_err(stop_failed)
            .and_then(|()| diskstats::bytes_written(&self.device_name));
        let unmounted = self.umount().map_err(stop_failed);

        let after = sampled?;
        unmounted?;

        if after < baseline {
            tracing::warn!(
                backend = %self.fs,
                baseline = baseline,
                after = after,
                "Device write counter went backwards"
            );
        }

        Ok(WriteMeasurement::new(after.saturating_sub(baseline)))
    }
}

impl Drop for KernelBackend {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            tracing::warn!(backend = %self.fs, "Adapter dropped while mounted, unmounting");
            if let Err(reason) = self.umount() {
                tracing::warn!(backend = %self.fs, reason = %reason, "Unmount on drop failed");
            }
        }
    }
}
