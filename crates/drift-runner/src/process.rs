use drift_core::mask_secrets;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const MAX_DETAIL: usize = 2000;

/// Captured output of a successful subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Shell command for the current platform.
#[cfg(windows)]
pub fn shell(cmd: &str) -> Command {
    // Prefer PowerShell over cmd.exe for `&&` support
    static SHELL: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    let shell = SHELL.get_or_init(|| {
        if which_exists("pwsh") {
            "pwsh".into()
        } else {
            "cmd.exe".into()
        }
    });

    let mut command = Command::new(shell);
    if shell == "cmd.exe" {
        command.args(["/C", cmd]);
    } else {
        command.args(["-NoProfile", "-Command", cmd]);
    }
    command
}

#[cfg(not(windows))]
pub fn shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.args(["-c", cmd]);
    command
}

#[cfg(windows)]
fn which_exists(name: &str) -> bool {
    std::process::Command::new("where")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a prepared command to completion.
///
/// The child is killed when the timeout fires or `cancel` triggers. On failure
/// the error is a one-line detail (`exit 1: <stderr>`) with secrets masked.
pub async fn run(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CommandOutput, String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let result = tokio::select! {
        _ = cancel.cancelled() => return Err(format!("cancelled: {label}")),
        r = tokio::time::timeout(timeout, cmd.output()) => r,
    };

    match result {
        Ok(Ok(output)) if output.status.success() => Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let text = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            Err(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                tail(&mask_secrets(&text)).trim()
            ))
        }
        Ok(Err(e)) => Err(format!("spawn error ({label}): {e}")),
        Err(_) => Err(format!(
            "timed out after {}s: {label}",
            timeout.as_secs_f64()
        )),
    }
}

/// Keep the end of long tool output, where package managers print the error.
fn tail(text: &str) -> String {
    if text.len() <= MAX_DETAIL {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DETAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
