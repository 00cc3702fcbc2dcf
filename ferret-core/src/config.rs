//! Configuration system for Ferret.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> explicit file -> environment. Configuration is loaded from
//! `~/.config/ferret/config.toml` and/or `.ferret/config.toml` in the workspace.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FerretConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub logging: LoggingConfig,
}

/// Chat model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for any OpenAI-compatible endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.tavily.com".to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Research loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Researcher iterations before the findings are handed back unconditionally.
    pub max_iterations: usize,
    /// Maximum node executions in a single graph run. Raised per run to fit
    /// `max_iterations`.
    pub recursion_limit: usize,
    /// Directory for file checkpoints. In-memory checkpoints are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            recursion_limit: 50,
            checkpoint_dir: None,
        }
    }
}

/// Logging configuration consumed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when no verbosity flag is given.
    pub level: String,
    /// Write JSON logs to a daily rolling file under the data directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: true,
        }
    }
}

impl FerretConfig {
    /// Check values that deserialize fine but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "llm.model must not be empty".into(),
            });
        }
        if self.research.recursion_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "research.recursion_limit must be at least 1".into(),
            });
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::Invalid {
                message: "search.max_results must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Project directories shared by config, checkpoints and logs.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "ferret", "ferret")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `FERRET_`, nested with `__`)
/// 2. Explicit config file, which must exist
/// 3. Workspace-local config (`.ferret/config.toml`)
/// 4. User config (`~/.config/ferret/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<FerretConfig, ConfigError> {
    let figment = file_layers(workspace, explicit)?
        // FERRET_LLM__MODEL, FERRET_RESEARCH__MAX_ITERATIONS, etc.
        .merge(Env::prefixed("FERRET_").split("__"));
    extract(figment)
}

fn file_layers(workspace: Option<&Path>, explicit: Option<&Path>) -> Result<Figment, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(FerretConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".ferret").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    Ok(figment)
}

fn extract(figment: Figment) -> Result<FerretConfig, ConfigError> {
    let config: FerretConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Resolve a secret from an explicit value or the named environment variable.
pub fn resolve_secret(explicit: Option<&str>, env_var: &str) -> Result<String, ConfigError> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::EnvVarMissing {
            var: env_var.to_string(),
        })
}
