// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stand-in mkfs and wrapper scripts for adapter tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use microbench_core::{ImageConfig, ImageSize, KernelConfig};
use tempfile::TempDir;

/// Writing an executable while another test forks can leave it busy (ETXTBSY),
/// so every test that writes or spawns scripts holds this lock.
static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Wrapper that mounts instantly and reports 43 bytes (42 after overhead).
pub const WRAPPER_OK: &str = r#"
echo "mounting $3"
echo "$$" > "$TOOLS/wrapper.pid"
if [ -n "$PINOPTS" ]; then printf '%s' "$PINOPTS" > "$TOOLS/pinopts"; fi
trap 'echo "unmounting"; echo "pin: 43 bytes written to BPRAM"; exit 0' TERM
echo "BPFS running"
while :; do sleep 0.05; done
"#;

/// Wrapper that fails before mounting.
pub const WRAPPER_NEVER_READY: &str = r#"
echo "fuse: bad superblock on $2" >&2
exit 1
"#;

/// Wrapper that mounts but exits without a summary.
pub const WRAPPER_NO_SUMMARY: &str = r#"
trap 'echo "unmounting"; exit 0' TERM
echo "BPFS running"
while :; do sleep 0.05; done
"#;

pub const MKFS_OK: &str = r#"
printf '%s' "$1" > "$TOOLS/mkfs.arg"
"#;

pub const MKFS_FAIL: &str = r#"
echo "mkfs.bpfs: image too small" >&2
exit 1
"#;

pub const PARSER_OK: &str = r#"
cat > "$TOOLS/parsed"
echo "parsed"
"#;

/// Privilege prefix that logs the command it was asked to run instead of
/// running it. `touch $TOOLS/fail-<program>` makes that program fail.
pub const PRIVILEGE_LOG: &str = r#"
echo "$*" >> "$TOOLS/commands"
if [ -e "$TOOLS/fail-$1" ]; then
    echo "$1: refused by stand-in" >&2
    exit 1
fi
"#;

pub const SYNC_LOG: &str = r#"
echo "sync" >> "$TOOLS/commands"
"#;

/// Temp directory holding the stand-in tools.
pub struct Tools {
    pub dir: TempDir,
}

impl Tools {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable `/bin/sh` script with `$TOOLS` bound to this directory.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let content = format!(
            "#!/bin/sh\nTOOLS='{}'\n{}",
            self.dir.path().display(),
            body.trim_start()
        );
        fs::write(&path, content).unwrap();

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Image backend configuration using the given wrapper and mkfs bodies.
    pub fn image_config(&self, wrapper: &str, mkfs: &str) -> ImageConfig {
        ImageConfig {
            mkfs: self.script("mkfs.bpfs", mkfs),
            counter: self.script("bpramcount", wrapper),
            trace_parser: self.script("parse_bpramcount", PARSER_OK),
            size: ImageSize::from_mb(1).unwrap(),
            mount_overhead_bytes: 1,
        }
    }

    /// Kernel backend configuration whose privileged commands and syncs are
    /// only logged to `$TOOLS/commands`.
    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig {
            privilege_command: Some(
                self.script("privilege", PRIVILEGE_LOG)
                    .to_string_lossy()
                    .into_owned(),
            ),
            sync_command: self.script("sync", SYNC_LOG).to_string_lossy().into_owned(),
        }
    }

    /// Make `program` fail when run through the logging privilege prefix.
    pub fn fail(&self, program: &str) {
        fs::write(self.dir.path().join(format!("fail-{}", program)), "").unwrap();
    }

    /// Commands logged so far, one per line.
    pub fn commands(&self) -> Vec<String> {
        self.read("commands")
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(name)).ok()
    }
}
