//! External command execution.
//!
//! The [`Executor`] trait is the seam between the dispatcher and whatever
//! runs non-control commands. [`ShellExecutor`] hands the text to the host
//! shell and captures at most a fixed number of bytes of its stdout; stderr
//! is inherited by the broker process and the exit status is not reported.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::{AppError, Result};

/// Runs an arbitrary command and returns its captured output.
pub trait Executor: Send + Sync {
    /// Execute `command`, returning at most `max_output_bytes` of stdout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Exec` if the command cannot be started or exceeds
    /// the executor's timeout.
    fn execute<'a>(
        &'a self,
        command: &'a str,
        max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}

/// Runs commands as `{shell} -c {command}`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    /// Create an executor for `shell`, optionally bounded by `timeout`.
    #[must_use]
    pub fn new(shell: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    /// Build from the broker configuration.
    #[must_use]
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(config.shell.clone(), config.exec_timeout())
    }

    async fn run(&self, command: &str, max_output_bytes: usize) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| AppError::Exec(format!("failed to start '{}': {err}", self.shell)))?;

        let mut output = Vec::with_capacity(max_output_bytes.min(8192));
        if let Some(stdout) = child.stdout.take() {
            let limit = u64::try_from(max_output_bytes).unwrap_or(u64::MAX);
            stdout
                .take(limit)
                .read_to_end(&mut output)
                .await
                .map_err(|err| AppError::Exec(format!("failed to read command output: {err}")))?;
        }

        // Output beyond the limit is discarded with the closed pipe.
        let status = child
            .wait()
            .await
            .map_err(|err| AppError::Exec(format!("failed to wait for command: {err}")))?;
        debug!(%status, bytes = output.len(), "external command finished");

        Ok(output)
    }
}

impl Executor for ShellExecutor {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.run(command, max_output_bytes))
                    .await
                    .map_err(|_| {
                        AppError::Exec(format!("command timed out after {}s", limit.as_secs()))
                    })?,
                None => self.run(command, max_output_bytes).await,
            }
        })
    }
}
