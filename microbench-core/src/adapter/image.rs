//! BPFS on a temporary image, counted by the BPRAM instrumentation wrapper.
//!
//! The wrapper mounts the image on the mount point, prints a readiness line,
//! and on SIGTERM unmounts and prints the number of bytes written to the image.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::os::fd::OwnedFd;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use nix::fcntl::OFlag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::NamedTempFile;

use super::protocol::{self, Readiness};
use super::{FilesystemAdapter, MountPoint};
use crate::command;
use crate::config::ImageConfig;
use crate::error::AdapterError;
use crate::state::{MountSession, MountState};
use crate::types::{WriteMeasurement, IMAGE_BACKEND};

/// Environment variable carrying the instrumentation tool's own options.
const TRACE_OPTIONS_ENV: &str = "PINOPTS";

/// Images are filled in chunks of this size.
const FILL_CHUNK: usize = 16 * 1024;

/// Running instrumentation wrapper.
///
/// Holds the child and the read end of its joined stdout/stderr pipe.
struct CounterProcess {
    child: Child,
    output: BufReader<File>,
    pid: u32,
}

impl CounterProcess {
    /// Spawn the wrapper and block until it reports the mount is live.
    fn spawn(
        config: &ImageConfig,
        image: &Path,
        mount_point: &Path,
        trace_log: Option<&Path>,
    ) -> Result<Self, AdapterError> {
        let start_failed = |reason: String| AdapterError::StartFailed {
            backend: IMAGE_BACKEND.to_string(),
            reason,
        };

        // stdout and stderr share one pipe, like `2>&1`.
        let (read_end, write_end) = nix::unistd::pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| start_failed(format!("Failed to create output pipe: {}", e)))?;
        let stderr_end: OwnedFd = write_end
            .try_clone()
            .map_err(|e| start_failed(format!("Failed to duplicate output pipe: {}", e)))?;

        let mut command = Command::new(&config.counter);
        command
            .arg("-f")
            .arg(image)
            .arg(mount_point)
            .stdin(Stdio::null())
            .stdout(Stdio::from(write_end))
            .stderr(Stdio::from(stderr_end));

        if let Some(trace_log) = trace_log {
            command.env(TRACE_OPTIONS_ENV, trace_options(trace_log));
        }

        let mut child = command.spawn().map_err(|e| {
            start_failed(format!(
                "Failed to spawn {}: {}",
                config.counter.display(),
                e
            ))
        })?;
        // Drop our copies of the write end so EOF arrives when the child exits.
        drop(command);

        let pid = child.id();
        let mut output = BufReader::new(File::from(read_end));

        tracing::debug!(
            pid = pid,
            counter = %config.counter.display(),
            mount_point = %mount_point.display(),
            traced = trace_log.is_some(),
            "Spawned instrumentation wrapper"
        );

        match protocol::await_ready(&mut output) {
            Ok(Readiness::Ready { skipped }) => {
                tracing::debug!(pid = pid, skipped_lines = skipped, "Wrapper reported ready");
                Ok(Self { child, output, pid })
            }
            Ok(Readiness::Closed { last_line }) => {
                // A wrapper that closed its output without exiting is of no use either.
                let _ = child.kill();
                let status = child.wait().ok();
                Err(start_failed(format!(
                    "Output closed before readiness line (exit: {}, last output: {})",
                    status.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
                    last_line.as_deref().unwrap_or("<none>")
                )))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(start_failed(format!("Failed to read wrapper output: {}", e)))
            }
        }
    }

    /// Ask the wrapper to unmount and exit, returning everything it printed
    /// after the readiness line.
    fn terminate(mut self) -> Result<String, AdapterError> {
        let stop_failed = |reason: String| AdapterError::StopFailed {
            backend: IMAGE_BACKEND.to_string(),
            reason,
        };

        kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM)
            .map_err(|e| stop_failed(format!("Failed to signal pid {}: {}", self.pid, e)))?;

        let mut remaining = Vec::new();
        self.output
            .read_to_end(&mut remaining)
            .map_err(|e| stop_failed(format!("Failed to read wrapper output: {}", e)))?;

        let status = self
            .child
            .wait()
            .map_err(|e| stop_failed(format!("Failed to wait for pid {}: {}", self.pid, e)))?;

        tracing::debug!(pid = self.pid, status = %status, "Wrapper exited");

        Ok(String::from_utf8_lossy(&remaining).into_owned())
    }
}

impl Drop for CounterProcess {
    fn drop(&mut self) {
        // Still running only if terminate() was never reached.
        if let Ok(None) = self.child.try_wait() {
            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
            let _ = self.child.wait();
        }
    }
}

/// Option string handed to the instrumentation tool when tracing.
fn trace_options(trace_log: &Path) -> String {
    format!("-b true -o {}", trace_log.display())
}

/// BPFS backed by a temporary image file.
pub struct ImageBackend {
    config: ImageConfig,
    session: MountSession<CounterProcess>,
    image: NamedTempFile,
    mount_point: MountPoint,
}

impl ImageBackend {
    /// Create the backing image (filled with ASCII '0') and the mount point.
    pub fn create(config: &ImageConfig) -> Result<Self, AdapterError> {
        let mut image = tempfile::Builder::new()
            .prefix("microbench-img-")
            .tempfile()
            .map_err(|e| AdapterError::Io {
                context: "creating backing image",
                source: e,
            })?;

        let chunk = [b'0'; FILL_CHUNK];
        let chunks = config.size.bytes() / FILL_CHUNK as u64;
        for _ in 0..chunks {
            image.write_all(&chunk).map_err(|e| AdapterError::Io {
                context: "filling backing image",
                source: e,
            })?;
        }
        image.flush().map_err(|e| AdapterError::Io {
            context: "filling backing image",
            source: e,
        })?;

        let mount_point = MountPoint::create()?;

        tracing::debug!(
            image = %image.path().display(),
            size = %config.size,
            mount_point = %mount_point.path().display(),
            "Created backing image"
        );

        Ok(Self {
            config: config.clone(),
            session: MountSession::new(IMAGE_BACKEND),
            image,
            mount_point,
        })
    }

    /// Path of the backing image.
    pub fn image_path(&self) -> &Path {
        self.image.path()
    }
}

impl FilesystemAdapter for ImageBackend {
    fn name(&self) -> &str {
        IMAGE_BACKEND
    }

    fn mount_point(&self) -> &Path {
        self.mount_point.path()
    }

    fn state(&self) -> MountState {
        self.session.state()
    }

    fn supports_trace_log(&self) -> bool {
        true
    }

    fn format(&mut self) -> Result<(), AdapterError> {
        self.session.require_unmounted("format")?;

        let mut mkfs = Command::new(&self.config.mkfs);
        mkfs.arg(self.image.path());
        command::run_checked(&mut mkfs).map_err(|reason| AdapterError::FormatFailed {
            backend: IMAGE_BACKEND.to_string(),
            reason,
        })
    }

    fn mount(&mut self, trace_log: Option<&Path>) -> Result<(), AdapterError> {
        self.session.check_transition(MountState::Mounted)?;

        let process = CounterProcess::spawn(
            &self.config,
            self.image.path(),
            self.mount_point.path(),
            trace_log,
        )?;
        self.session.mounted(process)?;
        Ok(())
    }

    fn unmount(&mut self) -> Result<WriteMeasurement, AdapterError> {
        let process = self.session.unmounted()?;
        let output = process.terminate()?;

        let total = protocol::parse_summary(&output).ok_or_else(|| AdapterError::StopFailed {
            backend: IMAGE_BACKEND.to_string(),
            reason: "Wrapper exited without a bytes-written summary".to_string(),
        })?;

        let overhead = self.config.mount_overhead_bytes;
        if total < overhead {
            tracing::warn!(
                total = total,
                overhead = overhead,
                "Wrapper reported fewer bytes than the per-mount overhead"
            );
        }

        Ok(WriteMeasurement::new(total.saturating_sub(overhead)))
    }
}

impl Drop for ImageBackend {
    fn drop(&mut self) {
        if let Some(process) = self.session.take() {
            tracing::warn!(
                backend = IMAGE_BACKEND,
                "Adapter dropped while mounted, stopping wrapper"
            );
            let _ = process.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_options() {
        assert_eq!(
            trace_options(Path::new("pin-create.log")),
            "-b true -o pin-create.log"
        );
    }
}
