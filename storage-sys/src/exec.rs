// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use storage_contracts::traits::exec::render;
use storage_contracts::{CommandExecutor, CommandOutput};
use tokio::process::Command;

/// Runs commands as child processes of the driver.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        tracing::debug!(command = %render(program, args), "Running command");

        let output = Command::new(program).args(args).output().await?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            tracing::debug!(
                command = %program,
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "Command exited unsuccessfully"
            );
        }

        Ok(result)
    }
}

/// Run a command and turn a spawn failure or non-zero exit into a [`SysError`].
///
/// [`SysError`]: crate::SysError
pub(crate) async fn run_checked(
    executor: &dyn CommandExecutor,
    program: &str,
    args: &[String],
) -> crate::Result<CommandOutput> {
    let output = executor
        .run(program, args)
        .await
        .map_err(|source| crate::SysError::Spawn {
            command: program.to_string(),
            source,
        })?;

    if !output.success() {
        return Err(crate::SysError::CommandFailed {
            command: render(program, args),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}
