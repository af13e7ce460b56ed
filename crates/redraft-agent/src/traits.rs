use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::{AgentOutput, OutputCallback};

/// Errors that can occur while generating text
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent not found at path: {0}")]
    NotFound(String),

    #[error("Agent configuration error: {0}")]
    ConfigError(String),

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Generation request failed: {0}")]
    RequestFailed(String),
}

/// Per-call settings handed to a backend
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Working directory for CLI backends
    pub working_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables for CLI backends
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the backend supports it)
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
        }
    }
}

impl AgentConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    ClaudeCode,
    OpenCode,
    Cursor,
    /// OpenAI-compatible chat completions endpoint
    Http,
    /// Canned responses, used by tests
    Scripted,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::ClaudeCode => write!(f, "claude-code"),
            AgentType::OpenCode => write!(f, "opencode"),
            AgentType::Cursor => write!(f, "cursor"),
            AgentType::Http => write!(f, "http"),
            AgentType::Scripted => write!(f, "scripted"),
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(AgentType::ClaudeCode),
            "opencode" | "open-code" => Ok(AgentType::OpenCode),
            "cursor" => Ok(AgentType::Cursor),
            "http" | "openai" | "api" => Ok(AgentType::Http),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// A text-generation capability: prompt in, text out
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable name of the backend (e.g., "Claude Code")
    fn name(&self) -> &str;

    fn agent_type(&self) -> AgentType;

    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        self.generate_with_callback(prompt, config, None).await
    }

    /// Generate a completion, streaming output lines to the callback as they arrive
    async fn generate_with_callback(
        &self,
        prompt: &str,
        config: &AgentConfig,
        on_output: Option<OutputCallback>,
    ) -> Result<AgentOutput, AgentError>;

    /// Check if the backend can be reached
    async fn is_available(&self) -> bool;
}
