//! Configuration settings for MediCore.

use crate::error::{MediCoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the Azure OpenAI endpoint URL.
pub const ENV_AZURE_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable holding the Azure OpenAI API key.
pub const ENV_AZURE_KEY: &str = "AZURE_OPENAI_KEY";
/// Environment variable overriding the Azure OpenAI API version.
pub const ENV_AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
/// Environment variable holding the E2B sandbox API key.
pub const ENV_E2B_KEY: &str = "E2B_API_KEY";

/// API version used when neither the config file nor the environment sets one.
pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub sandbox: SandboxSettings,
    pub server: ServerSettings,
    pub verify: VerifySettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Chat model settings (Azure OpenAI deployment).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model / deployment id.
    pub model_id: String,
    /// Endpoint URL. Falls back to `AZURE_OPENAI_ENDPOINT`.
    pub endpoint: Option<String>,
    /// API key. Falls back to `AZURE_OPENAI_KEY`.
    pub api_key: Option<String>,
    /// API version. Falls back to `AZURE_OPENAI_API_VERSION`, then the default.
    pub api_version: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// HTTP timeout for model requests, in seconds.
    pub timeout_seconds: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: "gpt-4o".to_string(),
            endpoint: None,
            api_key: None,
            api_version: None,
            temperature: None,
            timeout_seconds: 300,
        }
    }
}

impl ModelSettings {
    /// Endpoint from config or environment.
    pub fn resolved_endpoint(&self) -> Result<String> {
        resolve(self.endpoint.as_deref(), ENV_AZURE_ENDPOINT)
    }

    /// API key from config or environment.
    pub fn resolved_api_key(&self) -> Result<String> {
        resolve(self.api_key.as_deref(), ENV_AZURE_KEY)
    }

    /// API version from config, environment, or the built-in default.
    pub fn resolved_api_version(&self) -> String {
        self.api_version
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var(ENV_AZURE_API_VERSION).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string())
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of model calls per run.
    pub max_steps: usize,
    /// Modules generated code may import on top of the safe base set.
    pub additional_authorized_imports: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            additional_authorized_imports: vec![
                "pandas".to_string(),
                "numpy".to_string(),
                "scipy".to_string(),
            ],
        }
    }
}

/// Which code executor backs the python interpreter tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Remote E2B sandbox (default).
    #[default]
    E2b,
    /// Local python subprocess.
    Local,
}

impl std::str::FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "e2b" | "remote" => Ok(ExecutorKind::E2b),
            "local" => Ok(ExecutorKind::Local),
            _ => Err(format!("Unknown executor: {}", s)),
        }
    }
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorKind::E2b => write!(f, "e2b"),
            ExecutorKind::Local => write!(f, "local"),
        }
    }
}

/// Code execution sandbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Executor backend.
    pub executor: ExecutorKind,
    /// E2B API key. Falls back to `E2B_API_KEY`.
    pub e2b_api_key: Option<String>,
    /// E2B control-plane URL.
    pub e2b_api_url: String,
    /// Domain hosting sandbox instances.
    pub e2b_domain: String,
    /// Sandbox template.
    pub e2b_template: String,
    /// HTTP timeout for sandbox requests and local execution, in seconds.
    pub timeout_seconds: u64,
    /// Lifetime requested for each remote sandbox, in seconds. A sandbox
    /// lives for one agent run and is killed when the run ends.
    pub lifetime_seconds: u64,
    /// Python interpreter for the local executor.
    pub python: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::E2b,
            e2b_api_key: None,
            e2b_api_url: "https://api.e2b.dev".to_string(),
            e2b_domain: "e2b.app".to_string(),
            e2b_template: "code-interpreter-v1".to_string(),
            timeout_seconds: 300,
            lifetime_seconds: 600,
            python: "python3".to_string(),
        }
    }
}

impl SandboxSettings {
    /// E2B API key from config or environment.
    pub fn resolved_e2b_api_key(&self) -> Result<String> {
        resolve(self.e2b_api_key.as_deref(), ENV_E2B_KEY)
    }
}

/// Web form server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

/// Setup verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    /// Python packages that must be importable.
    pub packages: Vec<String>,
    /// Project files that must exist (relative to the working directory).
    pub required_files: Vec<String>,
    /// Environment variables that must be set to a non-placeholder value.
    pub required_env: Vec<String>,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            packages: vec![
                "pandas".to_string(),
                "numpy".to_string(),
                "scipy".to_string(),
            ],
            required_files: vec!["Cargo.toml".to_string(), ".env.example".to_string()],
            required_env: vec![
                ENV_AZURE_ENDPOINT.to_string(),
                ENV_AZURE_KEY.to_string(),
                ENV_E2B_KEY.to_string(),
            ],
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MediCoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medicore")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}

/// Load `<dir>/.env` into the process environment, if present.
///
/// Parent directories are not searched, so what `verify` reports matches the
/// file it checks. Variables already set are left alone.
pub fn load_env_file(dir: &Path) -> Result<bool> {
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(false);
    }
    dotenvy::from_path(&path)
        .map_err(|e| MediCoreError::Config(format!("Failed to load {}: {}", path.display(), e)))?;
    Ok(true)
}

/// Prefer an explicit config value, then the environment variable.
fn resolve(configured: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(value) = configured.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(MediCoreError::Config(format!(
            "{} not set. Add it to .env or export it in your shell.",
            env_var
        ))),
    }
}
