mod cli;
mod http;
mod output;
mod scripted;
mod spawner;
mod traits;

pub use cli::CliAgent;
pub use http::{
    extract_completion, ChatCompletionsAgent, DEFAULT_API_BASE, DEFAULT_API_KEY_ENV, DEFAULT_MODEL,
};
pub use output::{AgentOutput, OutputCallback, OutputType};
pub use scripted::ScriptedAgent;
pub use spawner::ProcessSpawner;
pub use traits::{Agent, AgentConfig, AgentError, AgentType};

/// Settings for backends that need more than a type to construct
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Base URL of an OpenAI-compatible API
    pub api_base: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
}

/// Create a generation backend by type
pub fn create_agent(
    agent_type: AgentType,
    options: &BackendOptions,
) -> Result<Box<dyn Agent>, AgentError> {
    match agent_type {
        AgentType::ClaudeCode => Ok(Box::new(CliAgent::claude())),
        AgentType::OpenCode => Ok(Box::new(CliAgent::opencode())),
        AgentType::Cursor => Ok(Box::new(CliAgent::cursor())),
        AgentType::Http => Ok(Box::new(ChatCompletionsAgent::from_env(
            options.api_base.as_deref(),
            options.api_key_env.as_deref(),
        )?)),
        AgentType::Scripted => Err(AgentError::ConfigError(
            "scripted agents are constructed directly".into(),
        )),
    }
}
