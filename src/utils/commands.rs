use crate::config::CommandSpec;
use crate::errors::CommandError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run one post-deploy command in `working_dir`, waiting at most `timeout`.
/// Arguments are passed straight to the program, no shell is involved.
pub async fn run_command(
    spec: &CommandSpec,
    working_dir: &Path,
    timeout: Duration,
) -> Result<(), CommandError> {
    let command = spec.to_string();
    let child = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A timed out child is dropped, and so killed
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?,
        Err(_) => {
            return Err(CommandError::TimedOut { command, timeout })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        log::debug!("[{}] stdout: {}", command, stdout.trim());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        log::debug!("[{}] stderr: {}", command, stderr.trim());
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            command,
            status: output.status.to_string(),
        })
    }
}

/// Run every command in order. Failures are logged and never stop the
/// following commands; the number of commands that succeeded is returned.
pub async fn run_post_deploy(
    commands: &[&CommandSpec],
    working_dir: &Path,
    timeout: Duration,
) -> usize {
    let mut succeeded = 0;
    for spec in commands {
        match run_command(spec, working_dir, timeout).await {
            Ok(()) => {
                log::info!("Post-deploy command `{}` finished", spec);
                succeeded += 1;
            }
            Err(e) => log::error!("Post-deploy command failed: {}", e),
        }
    }
    succeeded
}
