// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Simulated BPFS toolchain for harness tests.
//!
//! The wrapper does not mount anything. It keeps the "image" contents in
//! `$TOOLS/store`, copying them into the mount point when started and back
//! out when terminated, so files survive from prepare to run like they would
//! on a real image. mkfs empties the store.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use microbench_core::{ImageConfig, ImageSize};
use tempfile::TempDir;

static SERIAL: Mutex<()> = Mutex::new(());

/// Held by every test that writes or spawns scripts (avoids ETXTBSY).
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

pub const WRAPPER: &str = r#"
mnt="$3"
mkdir -p "$TOOLS/store"
cp -R "$TOOLS/store/." "$mnt/"
if [ -n "$PINOPTS" ]; then
    echo "trace of $mnt" > "${PINOPTS##* -o }"
fi
trap 'rm -rf "$TOOLS/store"; mkdir "$TOOLS/store"; cp -R "$mnt/." "$TOOLS/store/"; rm -rf "$mnt"/*; echo "pin: 43 bytes written to BPRAM"; exit 0' TERM
echo "BPFS running"
while :; do sleep 0.05; done
"#;

pub const WRAPPER_NEVER_READY: &str = r#"
echo "fuse: failed to open $2" >&2
exit 1
"#;

pub const MKFS: &str = r#"
rm -rf "$TOOLS/store"
"#;

pub const PARSER: &str = r#"
echo "parsed: $(cat)"
"#;

/// Temp directory holding the simulated tools.
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

    pub fn image_config(&self, wrapper: &str) -> ImageConfig {
        ImageConfig {
            mkfs: self.script("mkfs.bpfs", MKFS),
            counter: self.script("bpramcount", wrapper),
            trace_parser: self.script("parse_bpramcount", PARSER),
            size: ImageSize::from_mb(1).unwrap(),
            mount_overhead_bytes: 1,
        }
    }

    /// YAML configuration pointing the binary at the simulated tools.
    pub fn config_file(&self, wrapper: &str) -> PathBuf {
        let image = self.image_config(wrapper);
        let path = self.dir.path().join("microbench.yaml");
        fs::write(
            &path,
            format!(
                "image:\n  mkfs: {}\n  counter: {}\n  trace_parser: {}\n  size_mb: 1\ntrace_dir: {}\n",
                image.mkfs.display(),
                image.counter.display(),
                image.trace_parser.display(),
                self.dir.path().display()
            ),
        )
        .unwrap();
        path
    }

    /// Whether `name` is in the simulated image.
    pub fn stored(&self, name: &str) -> bool {
        self.dir.path().join("store").join(name).exists()
    }
}
