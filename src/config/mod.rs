//! Configuration module for MediCore.
//!
//! Handles loading application settings, environment fallbacks and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    load_env_file,
    AgentSettings, ExecutorKind, GeneralSettings, ModelSettings, PromptSettings,
    SandboxSettings, ServerSettings, Settings, VerifySettings, DEFAULT_API_VERSION,
    ENV_AZURE_API_VERSION, ENV_AZURE_ENDPOINT, ENV_AZURE_KEY, ENV_E2B_KEY,
};
