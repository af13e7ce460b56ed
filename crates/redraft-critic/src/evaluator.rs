use async_trait::async_trait;
use redraft_agent::{Agent, AgentConfig, AgentError, OutputCallback};
use tracing::{debug, info};

use crate::{CriticPrompts, Critique, CritiqueParseError, DocumentContext};

/// Scores a document and itemizes its issues
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(
        &self,
        text: &str,
        context: &DocumentContext,
    ) -> Result<Critique, CriticError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CriticError {
    #[error("Agent execution error: {0}")]
    AgentError(#[from] AgentError),

    #[error("Critic exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Failed to parse critique: {0}")]
    ParseError(#[from] CritiqueParseError),

    #[error("Critic failed: {0}")]
    Failed(String),
}

/// Critic that asks a generation backend for a review and validates the reply
pub struct AgentCritic<'a> {
    agent: &'a dyn Agent,
    config: AgentConfig,
    on_output: Option<OutputCallback>,
}

impl<'a> AgentCritic<'a> {
    pub fn new(agent: &'a dyn Agent, config: AgentConfig) -> Self {
        Self {
            agent,
            config,
            on_output: None,
        }
    }

    /// Stream the backend's output lines to `callback`
    pub fn with_output_callback(mut self, callback: OutputCallback) -> Self {
        self.on_output = Some(callback);
        self
    }
}

#[async_trait]
impl<'a> Critic for AgentCritic<'a> {
    async fn critique(
        &self,
        text: &str,
        context: &DocumentContext,
    ) -> Result<Critique, CriticError> {
        let prompt = CriticPrompts::build_critique_prompt(text, context);

        debug!(
            prompt_len = prompt.len(),
            agent = self.agent.name(),
            "Running critic"
        );

        let output = self
            .agent
            .generate_with_callback(&prompt, &self.config, self.on_output.clone())
            .await?;

        info!(
            exit_code = output.exit_code,
            duration_secs = output.duration.as_secs_f64(),
            "Critic completed"
        );

        if !output.success() {
            return Err(CriticError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr_tail(5),
            });
        }

        Ok(Critique::parse(&output.text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redraft_agent::ScriptedAgent;

    #[tokio::test]
    async fn test_agent_critic_parses_reply() {
        let agent = ScriptedAgent::new([
            "Decent draft.\n<critique>{\"overall_score\": 0.55, \"issues\": [{\"category\": \"fees\", \"description\": \"Hourly rate missing\", \"severity\": \"high\"}]}</critique>",
        ]);
        let critic = AgentCritic::new(&agent, AgentConfig::default());
        let context = DocumentContext::new("retainer letter");

        let critique = critic.critique("Dear client", &context).await.unwrap();
        assert_eq!(critique.overall_score(), 0.55);
        assert_eq!(critique.issues()[0].category, "fees");

        let prompts = agent.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Dear client"));
    }

    #[tokio::test]
    async fn test_agent_critic_rejects_malformed_reply() {
        let agent = ScriptedAgent::new(["I think it's great!"]);
        let critic = AgentCritic::new(&agent, AgentConfig::default());

        let result = critic.critique("text", &DocumentContext::default()).await;
        assert!(matches!(
            result,
            Err(CriticError::ParseError(CritiqueParseError::NoCritiqueFound))
        ));
    }

    #[tokio::test]
    async fn test_agent_critic_propagates_backend_failure() {
        let agent = ScriptedAgent::default();
        agent.push_failure("connection reset");
        let critic = AgentCritic::new(&agent, AgentConfig::default());

        let result = critic.critique("text", &DocumentContext::default()).await;
        assert!(matches!(result, Err(CriticError::AgentError(_))));
    }
}
