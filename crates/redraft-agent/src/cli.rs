use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, AgentType, OutputCallback, ProcessSpawner};

/// A coding-agent CLI used in non-interactive, print-only mode
pub struct CliAgent {
    kind: AgentType,
    binary_path: PathBuf,
}

impl CliAgent {
    /// `claude --print`
    pub fn claude() -> Self {
        Self {
            kind: AgentType::ClaudeCode,
            binary_path: PathBuf::from("claude"),
        }
    }

    /// `opencode run`
    pub fn opencode() -> Self {
        Self {
            kind: AgentType::OpenCode,
            binary_path: PathBuf::from("opencode"),
        }
    }

    /// `cursor agent -p`
    pub fn cursor() -> Self {
        Self {
            kind: AgentType::Cursor,
            binary_path: PathBuf::from("cursor"),
        }
    }


    /// Command-line arguments for a single generation call
    pub fn build_args<'a>(&self, prompt: &'a str, model: Option<&'a str>) -> Vec<&'a str> {
        let mut args = Vec::new();
        match self.kind {
            AgentType::OpenCode => {
                args.push("run");
                if let Some(model) = model {
                    args.extend(["--model", model]);
                }
                args.extend(["--prompt", prompt]);
            }
            AgentType::Cursor => {
                args.extend(["agent", "-p", prompt, "--output-format", "text"]);
                if let Some(model) = model {
                    args.extend(["--model", model]);
                }
            }
            _ => {
                args.extend(["--print", "--output-format", "text"]);
                if let Some(model) = model {
                    args.extend(["--model", model]);
                }
                // Prompts starting with '-' must not be read as options
                args.extend(["--", prompt]);
            }
        }
        args
    }
}

#[async_trait]
impl Agent for CliAgent {
    fn name(&self) -> &str {
        match self.kind {
            AgentType::OpenCode => "OpenCode",
            AgentType::Cursor => "Cursor",
            _ => "Claude Code",
        }
    }

    fn agent_type(&self) -> AgentType {
        self.kind
    }

    async fn is_available(&self) -> bool {
        let version_args: &[&str] = match self.kind {
            AgentType::Cursor => &["agent", "--help"],
            _ => &["--version"],
        };
        Command::new(&self.binary_path)
            .args(version_args)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn generate_with_callback(
        &self,
        prompt: &str,
        config: &AgentConfig,
        on_output: Option<OutputCallback>,
    ) -> Result<AgentOutput, AgentError> {
        debug!(
            agent = self.name(),
            prompt_len = prompt.len(),
            "Generating with CLI agent"
        );

        let args = self.build_args(prompt, config.model.as_deref());
        ProcessSpawner::spawn_with_callback(&self.binary_path, &args, config, on_output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_args_end_options_before_prompt() {
        let agent = CliAgent::claude();
        let args = agent.build_args("-starts with dash", Some("opus"));
        assert_eq!(
            args,
            vec![
                "--print",
                "--output-format",
                "text",
                "--model",
                "opus",
                "--",
                "-starts with dash"
            ]
        );
    }

    #[test]
    fn test_opencode_args() {
        let agent = CliAgent::opencode();
        assert_eq!(agent.build_args("hi", None), vec!["run", "--prompt", "hi"]);
    }

    #[test]
    fn test_cursor_args_with_model() {
        let agent = CliAgent::cursor();
        let args = agent.build_args("hi", Some("gpt-5"));
        assert_eq!(
            args,
            vec!["agent", "-p", "hi", "--output-format", "text", "--model", "gpt-5"]
        );
        assert_eq!(agent.agent_type(), AgentType::Cursor);
    }
}
