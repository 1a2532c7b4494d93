//! Shared subprocess plumbing for command-line collaborators

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::CollaboratorError;

/// Run a command to completion with a hard timeout
///
/// Non-zero exit becomes `CommandFailed` with captured stderr.
pub(crate) async fn run_checked(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> Result<Output, CollaboratorError> {
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| CollaboratorError::Timeout {
            command: label.to_string(),
            seconds: timeout.as_secs(),
        })??;

    if !output.status.success() {
        return Err(CollaboratorError::CommandFailed {
            command: label.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}
