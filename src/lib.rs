//! MediCore - Clinical Decision Support Agent
//!
//! A tool-calling LLM agent for physicians, backed by an Azure OpenAI
//! deployment and a remote code sandbox.
//!
//! # Overview
//!
//! MediCore allows you to:
//! - Ask free-text clinical questions from the command line or a web form
//! - Let the agent compute renal function (GFR) and look up treatment protocols
//! - Run agent-written Python in an E2B sandbox, restricted to an import allow-list
//! - Verify that dependencies, project files and credentials are in place
//!
//! # Architecture
//!
//! - `config` - Settings file, environment fallbacks and prompt templates
//! - `clinical` - Domain tools (renal calculator, guideline lookups)
//! - `model` - Chat model abstraction and the Azure OpenAI backend
//! - `sandbox` - Import screening and code executors (E2B, local)
//! - `agent` - Tool registry and the bounded tool-calling loop
//! - `cli` - Command line, web form server and setup verification
//!
//! # Example
//!
//! ```rust,no_run
//! use medicore::agent::Agent;
//! use medicore::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let agent = Agent::from_settings(&settings, None)?;
//!
//!     let response = agent
//!         .run("A 65-year-old female has creatinine 1.2. Calculate her GFR.")
//!         .await?;
//!     println!("{}", response.content);
//!
//!     agent.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod clinical;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod openai;
pub mod sandbox;

#[cfg(test)]
mod testing;

pub use error::{MediCoreError, Result};
