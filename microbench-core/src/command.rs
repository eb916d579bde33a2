//! Helpers for running the external filesystem tools.
//!
//! mkfs, mount, umount and friends are run to completion with captured output;
//! failures carry the tool's stderr so the caller can wrap it in a typed error.

use std::ffi::OsStr;
use std::process::Command;

/// Build a command, optionally prefixed with a privilege escalation tool.
///
/// `privileged(Some("sudo"), "mount", ..)` runs `sudo mount ..`;
/// `privileged(None, "mount", ..)` runs `mount ..` directly.
pub fn privileged<I, S>(prefix: Option<&str>, program: &str, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = match prefix {
        Some(prefix) => {
            let mut command = Command::new(prefix);
            command.arg(program);
            command
        }
        None => Command::new(program),
    };
    command.args(args);
    command
}

/// Run a command to completion, failing with a readable reason on a spawn
/// error or a non-zero exit status.
pub fn run_checked(command: &mut Command) -> Result<(), String> {
    let rendered = render(command);
    tracing::debug!(command = %rendered, "Running command");

    let output = command
        .output()
        .map_err(|e| format!("Failed to execute {}: {}", rendered, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {}: {}",
            rendered,
            output.status,
            stderr.trim()
        ));
    }

    Ok(())
}

/// Render a command line for logs and error messages.
pub fn render(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}
