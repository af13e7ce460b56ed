use async_trait::async_trait;
use std::cmp::Reverse;
use redraft_agent::{Agent, AgentConfig, AgentError, OutputCallback};
use redraft_critic::{Critique, DocumentContext};
use tracing::{debug, info};

use crate::{extract_revision, RefinerPrompts, RevisionParseError};

/// Rewrites a document given the critic's findings
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(
        &self,
        text: &str,
        critique: &Critique,
        context: &DocumentContext,
    ) -> Result<String, RefinerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RefinerError {
    #[error("Agent execution error: {0}")]
    AgentError(#[from] AgentError),

    #[error("Refiner exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Failed to extract revision: {0}")]
    ParseError(#[from] RevisionParseError),

    #[error("Refiner failed: {0}")]
    Failed(String),
}

/// Refiner that asks a generation backend for a full revision
pub struct AgentRefiner<'a> {
    agent: &'a dyn Agent,
    config: AgentConfig,
    on_output: Option<OutputCallback>,
}

impl<'a> AgentRefiner<'a> {
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
impl<'a> Refiner for AgentRefiner<'a> {
    async fn refine(
        &self,
        text: &str,
        critique: &Critique,
        context: &DocumentContext,
    ) -> Result<String, RefinerError> {
        let prompt = RefinerPrompts::build_refine_prompt(text, critique, context);

        debug!(
            prompt_len = prompt.len(),
            agent = self.agent.name(),
            issues = critique.issues().len(),
            "Running refiner"
        );

        let output = self
            .agent
            .generate_with_callback(&prompt, &self.config, self.on_output.clone())
            .await?;

        info!(
            exit_code = output.exit_code,
            duration_secs = output.duration.as_secs_f64(),
            "Refiner completed"
        );

        if !output.success() {
            return Err(RefinerError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr_tail(5),
            });
        }

        Ok(extract_revision(&output.text)?)
    }
}

/// Refiner that applies the critic's suggested corrections verbatim.
///
/// No model is called; fragments not found in the text are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrectionRefiner;

impl CorrectionRefiner {
    pub fn new() -> Self {
        Self
    }

    /// Apply every suggested correction, returning the new text and how many applied.
    ///
    /// Fragments are matched against the input only, so a replacement is never
    /// rewritten by another correction. Where matches overlap, the earliest
    /// wins, then the longest.
    pub fn apply(text: &str, critique: &Critique) -> (String, usize) {
        let corrections: Vec<(&str, &str)> = critique
            .suggested_corrections()
            .iter()
            .filter(|(original, _)| !original.is_empty())
            .map(|(original, replacement)| (original.as_str(), replacement.as_str()))
            .collect();
        let mut used = vec![false; corrections.len()];
        let mut revised = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let next = corrections
                .iter()
                .enumerate()
                .filter_map(|(i, (original, _))| {
                    rest.find(*original).map(|pos| (pos, Reverse(original.len()), i))
                })
                .min();
            let Some((pos, Reverse(len), i)) = next else {
                break;
            };
            revised.push_str(&rest[..pos]);
            revised.push_str(corrections[i].1);
            rest = &rest[pos + len..];
            used[i] = true;
        }
        revised.push_str(rest);

        (revised, used.iter().filter(|u| **u).count())
    }
}

#[async_trait]
impl Refiner for CorrectionRefiner {
    async fn refine(
        &self,
        text: &str,
        critique: &Critique,
        _context: &DocumentContext,
    ) -> Result<String, RefinerError> {
        let (revised, applied) = Self::apply(text, critique);
        debug!(
            applied,
            suggested = critique.suggested_corrections().len(),
            "Applied suggested corrections"
        );
        Ok(revised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redraft_agent::ScriptedAgent;

    #[tokio::test]
    async fn test_agent_refiner_extracts_revision() {
        let agent = ScriptedAgent::new([
            "Sure.\n<revised_document>\nDear Ms. Patel,\nOur fee is $300/hr.\n</revised_document>",
        ]);
        let refiner = AgentRefiner::new(&agent, AgentConfig::default());
        let critique = Critique::new(0.5).unwrap();

        let revised = refiner
            .refine("Dear Sir,", &critique, &DocumentContext::default())
            .await
            .unwrap();
        assert_eq!(revised, "Dear Ms. Patel,\nOur fee is $300/hr.");
        assert!(agent.prompts()[0].contains("Dear Sir,"));
    }

    #[tokio::test]
    async fn test_agent_refiner_propagates_empty_revision() {
        let agent = ScriptedAgent::new(["<revised_document></revised_document>"]);
        let refiner = AgentRefiner::new(&agent, AgentConfig::default());
        let critique = Critique::new(0.5).unwrap();

        let result = refiner
            .refine("text", &critique, &DocumentContext::default())
            .await;
        assert!(matches!(
            result,
            Err(RefinerError::ParseError(RevisionParseError::EmptyRevision))
        ));
    }

    #[tokio::test]
    async fn test_correction_refiner_applies_known_fragments() {
        let critique = Critique::new(0.5)
            .unwrap()
            .with_correction("Dear Sir", "Dear Ms. Patel")
            .with_correction("not in text", "ignored");

        let revised = CorrectionRefiner::new()
            .refine("Dear Sir, thanks.", &critique, &DocumentContext::default())
            .await
            .unwrap();
        assert_eq!(revised, "Dear Ms. Patel, thanks.");

        let (_, applied) = CorrectionRefiner::apply("Dear Sir", &critique);
        assert_eq!(applied, 1);
    }

    #[test]
    fn test_corrections_do_not_chain() {
        let critique = Critique::new(0.5)
            .unwrap()
            .with_correction("a", "b")
            .with_correction("b", "c");

        assert_eq!(CorrectionRefiner::apply("a", &critique), ("b".to_string(), 1));
        assert_eq!(CorrectionRefiner::apply("ab", &critique), ("bc".to_string(), 2));
    }

    #[test]
    fn test_longest_fragment_wins_at_same_position() {
        let critique = Critique::new(0.5)
            .unwrap()
            .with_correction("Dear", "Hello")
            .with_correction("Dear Sir", "Dear Ms. Patel");

        let (revised, applied) = CorrectionRefiner::apply("Dear Sir, Dear all", &critique);
        assert_eq!(revised, "Dear Ms. Patel, Hello all");
        assert_eq!(applied, 2);
    }
}
