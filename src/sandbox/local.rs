//! Local execution through a Python subprocess.

use super::{CodeExecutor, ExecutionOutput};
use crate::config::SandboxSettings;
use crate::error::{MediCoreError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs each snippet with `python -c` inside a throwaway working directory.
pub struct LocalExecutor {
    python: String,
    timeout: Duration,
}

impl LocalExecutor {
    /// Create an executor for the given interpreter.
    pub fn new(python: &str, timeout: Duration) -> Self {
        Self {
            python: python.to_string(),
            timeout,
        }
    }

    /// Create an executor from settings.
    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self::new(
            &settings.python,
            Duration::from_secs(settings.timeout_seconds.max(1)),
        )
    }
}

#[async_trait]
impl CodeExecutor for LocalExecutor {
    #[instrument(skip(self, code), fields(python = %self.python, bytes = code.len()))]
    async fn execute(&self, code: &str) -> Result<ExecutionOutput> {
        let workdir = tempfile::tempdir()?;

        let child = Command::new(&self.python)
            .arg("-c")
            .arg(code)
            .current_dir(workdir.path())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediCoreError::ToolNotFound(self.python.clone()));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(MediCoreError::Sandbox(format!(
                    "Execution timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!("Local execution exited with {}", output.status);

        let error = if output.status.success() {
            None
        } else {
            // The last traceback line names the exception.
            Some(
                stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .map(|l| l.trim().to_string())
                    .unwrap_or_else(|| format!("process exited with {}", output.status)),
            )
        };

        Ok(ExecutionOutput {
            stdout,
            stderr,
            results: Vec::new(),
            error,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
