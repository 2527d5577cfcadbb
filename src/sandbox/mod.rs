//! Sandboxed execution of model-generated Python code.
//!
//! Code is screened by an [`ImportPolicy`] before it reaches an executor.
//! The remote E2B executor is the default; the local executor shells out to
//! a Python interpreter and is meant for development.

mod e2b;
mod imports;
mod local;

pub use e2b::E2bExecutor;
pub use imports::{ImportPolicy, BASE_AUTHORIZED_IMPORTS};
pub use local::LocalExecutor;

use crate::config::{ExecutorKind, SandboxSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Captured result of running one code snippet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    /// Everything printed to stdout.
    pub stdout: String,
    /// Everything printed to stderr.
    pub stderr: String,
    /// Values of evaluated expressions (remote executor only).
    pub results: Vec<String>,
    /// Exception raised by the code, if any.
    pub error: Option<String>,
}

impl ExecutionOutput {
    /// Whether the code ran without raising.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Format the output as tool-result text for the model.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        let stdout = self.stdout.trim_end();
        if !stdout.is_empty() {
            parts.push(stdout.to_string());
        }
        for result in &self.results {
            parts.push(format!("=> {}", result));
        }
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() && self.error.is_none() {
            parts.push(format!("stderr:\n{}", stderr));
        }
        if let Some(error) = &self.error {
            parts.push(format!("Error: {}", error));
        }

        if parts.is_empty() {
            "Code executed successfully (no output).".to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// Trait for code execution backends.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Run a snippet of Python code.
    async fn execute(&self, code: &str) -> Result<ExecutionOutput>;

    /// Release any remote resources. Safe to call more than once.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// A fresh executor with the same configuration and no shared state,
    /// for one agent run. `None` when the executor keeps no state.
    fn scoped(&self) -> Option<Arc<dyn CodeExecutor>> {
        None
    }

    /// Backend name, for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Build the executor selected in settings.
pub fn from_settings(settings: &SandboxSettings) -> Result<Arc<dyn CodeExecutor>> {
    match settings.executor {
        ExecutorKind::E2b => Ok(Arc::new(E2bExecutor::from_settings(settings)?)),
        ExecutorKind::Local => Ok(Arc::new(LocalExecutor::from_settings(settings))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty() {
        let output = ExecutionOutput::default();
        assert_eq!(output.render(), "Code executed successfully (no output).");
        assert!(output.success());
    }

    #[test]
    fn test_render_stdout_and_result() {
        let output = ExecutionOutput {
            stdout: "calculating\n".to_string(),
            results: vec!["3".to_string()],
            ..Default::default()
        };
        assert_eq!(output.render(), "calculating\n=> 3");
    }

    #[test]
    fn test_render_error_hides_stderr() {
        let output = ExecutionOutput {
            stderr: "Traceback ...".to_string(),
            error: Some("NameError: name 'x' is not defined".to_string()),
            ..Default::default()
        };
        assert_eq!(output.render(), "Error: NameError: name 'x' is not defined");
        assert!(!output.success());
    }

    #[test]
    fn test_local_executor_from_settings() {
        let settings = SandboxSettings {
            executor: ExecutorKind::Local,
            ..Default::default()
        };
        let executor = from_settings(&settings).unwrap();
        assert_eq!(executor.name(), "local");
        assert!(executor.scoped().is_none());
    }
}
