//! Run command implementation.

use crate::agent::Agent;
use crate::cli::output::content_preview;
use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, EXAMPLE_QUERY};
use crate::config::Settings;
use anyhow::Result;
use tracing::warn;

/// Run the agent once and print the answer to stdout.
pub async fn run_query(query: Option<&str>, model: Option<String>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Agent, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'medicore verify' for detailed diagnostics.");
        return Err(e.into());
    }

    let query = query.unwrap_or(EXAMPLE_QUERY);
    let agent = Agent::from_settings(&settings, model.as_deref())?;

    let spinner = Output::spinner("Agent is reasoning and executing secure code...");
    let result = agent.run(query).await;
    spinner.finish_and_clear();

    if let Err(e) = agent.shutdown().await {
        warn!("Failed to release sandbox: {}", e);
    }

    match result {
        Ok(response) => {
            println!("{}", response.content);

            if !response.steps.is_empty() {
                Output::header(&format!("Tool calls ({})", response.steps.len()));
                for call in &response.steps {
                    Output::info(&format!(
                        "  {} {}",
                        call.name,
                        content_preview(&call.arguments, 60)
                    ));
                }
                println!();
            }

            Output::info(&format!(
                "Completed in {} step(s) with {}",
                response.iterations, response.model
            ));
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Agent failed: {}", e));
            Err(e.into())
        }
    }
}
