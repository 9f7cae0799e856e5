//! Synchronous shell command primitive
//!
//! Spawn, wait, return the exit code. A non-zero exit is a normal result,
//! never an error; only a failure to spawn surfaces as one.

use crate::error::Result;
use async_trait::async_trait;

/// Runs one rendered shell command and reports its exit code
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute the command and wait for its exit code
    async fn run(&self, command: &str) -> Result<i32>;
}

/// Production runner: `sh -c <command>` with inherited stdio
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<i32> {
        tracing::debug!("Running shell command: {}", command);

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await?;

        // Signal-terminated processes carry no code; fold to a failure exit.
        Ok(status.code().unwrap_or(-1))
    }
}
