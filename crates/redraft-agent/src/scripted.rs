use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, OutputCallback, OutputType};

/// Agent that replays canned responses in order and records every prompt.
/// No model is involved, so loops built on it are deterministic.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Ok(response.into()));
    }

    /// Queue a failed call
    pub fn push_failure(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Err(message.into()));
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Scripted
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate_with_callback(
        &self,
        prompt: &str,
        _config: &AgentConfig,
        on_output: Option<OutputCallback>,
    ) -> Result<AgentOutput, AgentError> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        match next {
            Some(Ok(text)) => {
                if let Some(callback) = on_output {
                    for line in text.lines() {
                        callback(line, OutputType::Stdout);
                    }
                }
                Ok(AgentOutput::new(text, String::new(), 0, Duration::ZERO))
            }
            Some(Err(message)) => Err(AgentError::ExecutionFailed(message)),
            None => Err(AgentError::ExecutionFailed(
                "Scripted agent has no responses left".into(),
            )),
        }
    }
}
