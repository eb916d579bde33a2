//! Cumulative per-device write counters from /proc/diskstats.

use std::path::Path;

use crate::error::AdapterError;

/// /proc/diskstats counts in 512-byte sectors regardless of the device's
/// logical block size.
pub const SECTOR_SIZE: u64 = 512;

/// Kernel name of a block device path: `/dev/sdb1` → `sdb1`.
pub fn device_name(device: &Path) -> Result<String, AdapterError> {
    device
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AdapterError::DeviceNotFound {
            device: device.display().to_string(),
        })
}

/// Total bytes written to `device` (a kernel device name) since boot.
pub fn bytes_written(device: &str) -> Result<u64, AdapterError> {
    let stats = procfs::diskstats().map_err(|e| AdapterError::DiskStatsUnavailable {
        reason: e.to_string(),
    })?;

    stats
        .iter()
        .find(|stat| stat.name == device)
        .map(|stat| stat.sectors_written as u64 * SECTOR_SIZE)
        .ok_or_else(|| AdapterError::DeviceNotFound {
            device: device.to_string(),
        })
}
