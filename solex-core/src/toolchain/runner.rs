//! Run-and-capture process execution.
//!
//! External commands sit behind the [`ProcessRunner`] trait so install and
//! unpack policy can be tested without `pac` or `dotnet` on the machine.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },
}

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code; `-1` if the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability interface for launching external processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a program to completion, capturing both output streams.
    ///
    /// A launch failure (program missing, not executable) is an error; a
    /// non-zero exit is a normal result the caller inspects.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ToolchainError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ToolchainError> {
        debug!(program, ?args, "Launching external process");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolchainError::Launch {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(program, exit_code = result.exit_code, "Process finished");
        Ok(result)
    }
}
