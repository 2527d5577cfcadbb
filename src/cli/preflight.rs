//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials are available before the agent is built, so a
//! misconfigured setup fails with a pointer to `medicore verify` instead of
//! an error from deep inside a request.

use crate::config::{ExecutorKind, Settings};
use crate::error::{MediCoreError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Running the agent needs the model endpoint/key and sandbox credentials.
    Agent,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Agent => {
            settings.model.resolved_endpoint()?;
            settings.model.resolved_api_key()?;
            if settings.sandbox.executor == ExecutorKind::E2b {
                settings.sandbox.resolved_e2b_api_key()?;
            }
            if settings.agent.max_steps == 0 {
                return Err(MediCoreError::Config(
                    "agent.max_steps must be at least 1".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_with_explicit_credentials() {
        let mut settings = Settings::default();
        settings.model.endpoint = Some("https://clinic.openai.azure.com".to_string());
        settings.model.api_key = Some("key".to_string());
        settings.sandbox.executor = ExecutorKind::Local;
        assert!(check(Operation::Agent, &settings).is_ok());

        settings.agent.max_steps = 0;
        assert!(check(Operation::Agent, &settings).is_err());
    }
}
