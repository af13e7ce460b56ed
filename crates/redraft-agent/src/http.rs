use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, OutputCallback, OutputType};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const TEMPERATURE: f32 = 0.2;

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct ChatCompletionsAgent {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsAgent {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into(),
            api_key,
        })
    }

    /// Build from the environment. The key is read from `key_env`
    /// (default `OPENAI_API_KEY`); a missing key is allowed for local endpoints.
    pub fn from_env(api_base: Option<&str>, key_env: Option<&str>) -> Result<Self, AgentError> {
        let key_env = key_env.unwrap_or(DEFAULT_API_KEY_ENV);
        let api_key = std::env::var(key_env).ok().filter(|k| !k.is_empty());
        Self::new(api_base.unwrap_or(DEFAULT_API_BASE), api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn is_hosted_default(&self) -> bool {
        self.api_base.trim_end_matches('/') == DEFAULT_API_BASE
    }
}

/// Pull the first choice's message content out of a completions response body
pub fn extract_completion(body: &str) -> Result<String, AgentError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::ExecutionFailed(format!("Invalid completion response: {}", e)))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(AgentError::ExecutionFailed(
            "Completion response contained no content".into(),
        ));
    }
    Ok(content)
}

#[async_trait]
impl Agent for ChatCompletionsAgent {
    fn name(&self) -> &str {
        "Chat Completions API"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Http
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some() || !self.is_hosted_default()
    }

    async fn generate_with_callback(
        &self,
        prompt: &str,
        config: &AgentConfig,
        on_output: Option<OutputCallback>,
    ) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

        debug!(
            endpoint = %self.endpoint(),
            model,
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": TEMPERATURE,
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(limit) = config.timeout {
            request = request.timeout(limit);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(config.timeout.unwrap_or_default())
            } else {
                AgentError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(config.timeout.unwrap_or_default())
            } else {
                AgentError::RequestFailed(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(AgentError::RequestFailed(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let content = extract_completion(&text)?;

        if let Some(callback) = on_output {
            for line in content.lines() {
                callback(line, OutputType::Stdout);
            }
        }

        let duration = start.elapsed();
        debug!(duration_ms = duration.as_millis(), "Completion received");

        Ok(AgentOutput::new(content, String::new(), 0, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello there"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "Hello there");
    }

    #[test]
    fn test_extract_completion_rejects_empty_choices() {
        let body = r#"{"choices":[]}"#;
        assert!(matches!(
            extract_completion(body),
            Err(AgentError::ExecutionFailed(_))
        ));
    }

    #[test]
    fn test_extract_completion_rejects_garbage() {
        assert!(extract_completion("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let agent = ChatCompletionsAgent::new("http://localhost:8000/v1/", None).unwrap();
        assert_eq!(agent.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_local_endpoint_available_without_key() {
        let local = ChatCompletionsAgent::new("http://localhost:8000/v1", None).unwrap();
        assert!(local.is_available().await);

        let hosted = ChatCompletionsAgent::new(DEFAULT_API_BASE, None).unwrap();
        assert!(!hosted.is_available().await);
    }
}
