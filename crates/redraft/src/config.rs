//! Project configuration file support for redraft.
//!
//! Loads configuration from `redraft.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use redraft_agent::BackendOptions;
use redraft_core::LoopConfig;

/// Project-level configuration loaded from `redraft.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default agent (applies to both critic and refiner)
    pub agent: Option<String>,
    /// Global default model (applies to both critic and refiner)
    pub model: Option<String>,
    #[serde(default)]
    pub critic: RoleConfig,
    #[serde(default)]
    pub refiner: RoleConfig,
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSettings,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Configuration for a specific role (critic or refiner)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub agent: Option<String>,
    pub model: Option<String>,
}

/// Stopping rules; unset keys fall back to the built-in defaults
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopSettings {
    pub max_iterations: Option<usize>,
    pub quality_threshold: Option<f64>,
    pub min_improvement: Option<f64>,
    /// e.g. "90s" or "2m"
    #[serde(default, with = "humantime_serde")]
    pub call_timeout: Option<Duration>,
}

/// OpenAI-compatible endpoint settings for the `http` agent
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub api_base: Option<String>,
    pub api_key_env: Option<String>,
}

pub const CONFIG_FILE_NAME: &str = "redraft.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        Self::load_file(&config_path).map(Some)
    }

    /// Load an explicit config file; a missing file is an error here
    pub fn load_file(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Priority: [critic].agent > global agent > None
    pub fn critic_agent(&self) -> Option<&str> {
        self.critic.agent.as_deref().or(self.agent.as_deref())
    }

    /// Priority: [critic].model > global model > None
    pub fn critic_model(&self) -> Option<&str> {
        self.critic.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [refiner].agent > global agent > None
    pub fn refiner_agent(&self) -> Option<&str> {
        self.refiner.agent.as_deref().or(self.agent.as_deref())
    }

    /// Priority: [refiner].model > global model > None
    pub fn refiner_model(&self) -> Option<&str> {
        self.refiner.model.as_deref().or(self.model.as_deref())
    }

    /// Loop settings from the file layered over the defaults
    pub fn loop_config(&self) -> LoopConfig {
        let defaults = LoopConfig::default();
        let settings = &self.loop_settings;
        LoopConfig {
            max_iterations: settings.max_iterations.unwrap_or(defaults.max_iterations),
            quality_threshold: settings
                .quality_threshold
                .unwrap_or(defaults.quality_threshold),
            min_improvement: settings.min_improvement.unwrap_or(defaults.min_improvement),
            call_timeout: settings.call_timeout.or(defaults.call_timeout),
        }
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            api_base: self.http.api_base.clone(),
            api_key_env: self.http.api_key_env.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
agent = "claude"
model = "sonnet"

[critic]
model = "opus"

[refiner]
agent = "http"

[loop]
max_iterations = 5
quality_threshold = 0.9
call_timeout = "90s"

[http]
api_base = "http://localhost:11434/v1"
api_key_env = "LOCAL_KEY"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.critic_agent(), Some("claude"));
        assert_eq!(config.critic_model(), Some("opus"));
        assert_eq!(config.refiner_agent(), Some("http"));
        assert_eq!(config.refiner_model(), Some("sonnet"));

        let loop_config = config.loop_config();
        assert_eq!(loop_config.max_iterations, 5);
        assert_eq!(loop_config.quality_threshold, 0.9);
        assert_eq!(loop_config.min_improvement, 0.05);
        assert_eq!(loop_config.call_timeout, Some(Duration::from_secs(90)));

        let backend = config.backend_options();
        assert_eq!(backend.api_base.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(backend.api_key_env.as_deref(), Some("LOCAL_KEY"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.critic_agent(), None);
        assert_eq!(config.loop_config(), LoopConfig::default());
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[loop]\nmax_passes = 2\n",
        )
        .unwrap();

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_load_file_requires_existing_path() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load_file(&dir.path().join("other.toml")).is_err());
    }
}
