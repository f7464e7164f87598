//! External tool invocation (ffmpeg, tesseract).
//!
//! Tools are spawned with `tokio::process` so a long extraction never blocks
//! a runtime worker. Output is captured in full; stderr is kept for error
//! messages. The child is killed if the timeout fires or the future is
//! dropped.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Captured result of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `bin` with `args`, failing on spawn errors, timeouts and non-zero exit.
///
/// The error string names the tool and carries the tail of its stderr.
pub async fn run_tool<I, S>(
    bin: &Path,
    args: I,
    timeout_secs: Option<u64>,
) -> Result<ToolOutput, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(bin);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Executing {:?}", cmd.as_std());

    let child = cmd.spawn().map_err(|e| {
        format!(
            "failed to spawn {}: {}. Ensure it is installed and on PATH.",
            bin.display(),
            e
        )
    })?;

    let output = match timeout_secs {
        Some(secs) => timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
            .map_err(|_| format!("{} timed out after {}s", bin.display(), secs))?,
        None => child.wait_with_output().await,
    }
    .map_err(|e| format!("{} did not complete: {}", bin.display(), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(format!(
            "{} exited with {}: {}",
            bin.display(),
            output.status,
            stderr_tail(&stderr)
        ));
    }

    Ok(ToolOutput { stdout, stderr })
}

/// The last few lines of a tool's stderr; ffmpeg prints its banner first.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}
