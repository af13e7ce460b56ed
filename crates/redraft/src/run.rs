//! Running the loop, or a single critique, over one input document.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use redraft_agent::{Agent, AgentConfig, OutputCallback, OutputType};
use redraft_core::{
    Critic, Critique, DocumentContext, LoopConfig, LoopError, LoopResult, ReflectionLoop,
};
use redraft_critic::{AgentCritic, SectionCheckingCritic};
use redraft_logging::{
    document_hash, AgentRole, LogEvent, Logger, SessionEnd, SessionStart, SessionWriter,
    StreamType,
};
use redraft_refiner::AgentRefiner;

/// Input name that reads the document from stdin
pub const STDIN_INPUT: &str = "-";

/// Generation backends and their per-role settings
pub struct Backends {
    pub critic: Box<dyn Agent>,
    pub refiner: Box<dyn Agent>,
    pub critic_config: AgentConfig,
    pub refiner_config: AgentConfig,
}

/// Everything a document run shares with the others
pub struct RunSettings<'a> {
    pub backends: &'a Backends,
    pub context: &'a DocumentContext,
    pub loop_config: &'a LoopConfig,
    pub logger: &'a Logger,
    pub write_sessions: bool,
}

/// Outcome of refining one input
#[derive(Debug, Serialize)]
pub struct DocumentReport {
    #[serde(skip)]
    pub index: usize,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LoopResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of critiquing one input without refining it
#[derive(Debug, Serialize)]
pub struct CritiqueReport {
    #[serde(skip)]
    pub index: usize,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critique: Option<Critique>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn input_label(input: &Path) -> String {
    if input.as_os_str() == STDIN_INPUT {
        "stdin".to_string()
    } else {
        input.display().to_string()
    }
}

pub async fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == STDIN_INPUT {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read document from stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))
}

/// `<stem>.refined.<ext>` in `output_dir`, or beside the input
pub fn refined_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let source = if input.as_os_str() == STDIN_INPUT {
        Path::new("stdin.txt")
    } else {
        input
    };

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let file_name = match source.extension() {
        Some(ext) => format!("{}.refined.{}", stem, ext.to_string_lossy()),
        None => format!("{}.refined", stem),
    };

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => source
            .parent()
            .map(|p| p.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

fn stream_callback(logger: Logger, role: AgentRole) -> OutputCallback {
    Arc::new(move |line: &str, output_type: OutputType| {
        let stream = match output_type {
            OutputType::Stdout => StreamType::Stdout,
            OutputType::Stderr => StreamType::Stderr,
        };
        logger.log(&LogEvent::AgentStreamLine {
            role,
            stream,
            line: line.to_string(),
        });
    })
}

fn build_critic<'a>(
    backends: &'a Backends,
    logger: &Logger,
) -> SectionCheckingCritic<AgentCritic<'a>> {
    let critic = AgentCritic::new(backends.critic.as_ref(), backends.critic_config.clone())
        .with_output_callback(stream_callback(logger.clone(), AgentRole::Critic));
    SectionCheckingCritic::new(critic)
}

/// Refine one input; `write_to` of None leaves the text for the caller to print
pub async fn process_document(
    index: usize,
    input: &Path,
    write_to: Option<PathBuf>,
    settings: &RunSettings<'_>,
) -> DocumentReport {
    let label = input_label(input);
    let mut report = DocumentReport {
        index,
        input: label.clone(),
        output_path: None,
        session_path: None,
        result: None,
        error: None,
    };

    let text = match read_input(input).await {
        Ok(text) => text,
        Err(e) => {
            report.error = Some(format!("{:#}", e));
            return report;
        }
    };

    let logger = settings.logger.scoped(label.clone());
    let session = if settings.write_sessions {
        open_session(&text, &label, settings)
    } else {
        None
    };
    report.session_path = session.as_ref().map(|s| s.path().to_path_buf());

    let critic = build_critic(settings.backends, &logger);
    let refiner = AgentRefiner::new(
        settings.backends.refiner.as_ref(),
        settings.backends.refiner_config.clone(),
    )
    .with_output_callback(stream_callback(logger.clone(), AgentRole::Refiner));

    let runner = ReflectionLoop::new(&critic, &refiner, Arc::new(logger));
    let started = std::time::Instant::now();

    match runner.run(&text, settings.context, settings.loop_config).await {
        Ok(result) => {
            if let Some(ref session) = session {
                for record in &result.iterations {
                    session.write_iteration(record.into());
                }
                session.write_end(SessionEnd {
                    stop_reason: result.stop_reason.to_string(),
                    converged: result.converged,
                    iterations: result.iterations.len(),
                    passes: result.passes,
                    final_score: Some(result.final_score()),
                    final_text: result.final_text.clone(),
                    protected_field_violation: result
                        .protected_field_violation
                        .as_ref()
                        .map(|v| v.field.clone()),
                    duration_secs: result.total_duration_secs,
                    timestamp: Utc::now(),
                });
            }

            if let Some(path) = write_to {
                match write_output(&path, &result.final_text).await {
                    Ok(()) => {
                        info!(input = %label, output = %path.display(), "Wrote refined document");
                        report.output_path = Some(path);
                    }
                    Err(e) => report.error = Some(format!("{:#}", e)),
                }
            }
            report.result = Some(result);
        }
        Err(e) => {
            warn!(input = %label, error = %e, "Document run failed");
            if let Some(ref session) = session {
                session.write_end(SessionEnd {
                    stop_reason: "failed".to_string(),
                    converged: false,
                    iterations: 0,
                    passes: 0,
                    final_score: None,
                    final_text: text.clone(),
                    protected_field_violation: None,
                    duration_secs: started.elapsed().as_secs_f64(),
                    timestamp: Utc::now(),
                });
            }
            report.error = Some(e.to_string());
        }
    }

    report
}

/// Run the critic once over one input
pub async fn critique_document(
    index: usize,
    input: &Path,
    settings: &RunSettings<'_>,
) -> CritiqueReport {
    let label = input_label(input);
    let mut report = CritiqueReport {
        index,
        input: label.clone(),
        critique: None,
        error: None,
    };

    let text = match read_input(input).await {
        Ok(text) => text,
        Err(e) => {
            report.error = Some(format!("{:#}", e));
            return report;
        }
    };
    if text.trim().is_empty() {
        report.error = Some(LoopError::EmptyDocument.to_string());
        return report;
    }

    let logger = settings.logger.scoped(label);
    let critic = build_critic(settings.backends, &logger);
    let call = critic.critique(&text, settings.context);
    let outcome = match settings.loop_config.call_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome.map_err(|e| e.to_string()),
            Err(_) => Err(format!("The critic call timed out after {:?}", limit)),
        },
        None => call.await.map_err(|e| e.to_string()),
    };

    match outcome {
        Ok(critique) => report.critique = Some(critique),
        Err(e) => report.error = Some(e),
    }
    report
}

fn open_session(text: &str, label: &str, settings: &RunSettings<'_>) -> Option<SessionWriter> {
    let session = match SessionWriter::new(text) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Could not open session log; continuing without it");
            return None;
        }
    };

    let backends = settings.backends;
    session.write_start(SessionStart {
        run_id: session.run_id().to_string(),
        timestamp: Utc::now(),
        source: Some(label.to_string()),
        document_type: settings.context.label().to_string(),
        jurisdiction: settings.context.jurisdiction.clone(),
        document_sha256: document_hash(text),
        document_chars: text.chars().count(),
        critic_agent: backends.critic.name().to_string(),
        refiner_agent: backends.refiner.name().to_string(),
        critic_model: backends.critic_config.model.clone(),
        refiner_model: backends.refiner_config.model.clone(),
        max_iterations: settings.loop_config.max_iterations,
        quality_threshold: settings.loop_config.quality_threshold,
        min_improvement: settings.loop_config.min_improvement,
    });
    Some(session)
}

async fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use redraft_agent::ScriptedAgent;
    use redraft_logging::LogFormat;
    use tempfile::TempDir;

    #[test]
    fn test_refined_path() {
        assert_eq!(
            refined_path(Path::new("drafts/letter.md"), None),
            PathBuf::from("drafts/letter.refined.md")
        );
        assert_eq!(
            refined_path(Path::new("drafts/letter.md"), Some(Path::new("out"))),
            PathBuf::from("out/letter.refined.md")
        );
        assert_eq!(
            refined_path(Path::new("NOTES"), None),
            PathBuf::from("NOTES.refined")
        );
        assert_eq!(
            refined_path(Path::new(STDIN_INPUT), Some(Path::new("out"))),
            PathBuf::from("out/stdin.refined.txt")
        );
    }

    fn backends(critic: Vec<&str>, refiner: Vec<&str>) -> Backends {
        Backends {
            critic: Box::new(ScriptedAgent::new(critic)),
            refiner: Box::new(ScriptedAgent::new(refiner)),
            critic_config: AgentConfig::default(),
            refiner_config: AgentConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_process_document_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("letter.md");
        std::fs::write(&input, "Dear Sir,\n\nWe accept.\n").unwrap();

        let backends = backends(
            vec![
                r#"<critique>{"overall_score": 0.4, "issues": [{"description": "Generic salutation"}]}</critique>"#,
                r#"<critique>{"overall_score": 0.92}</critique>"#,
            ],
            vec!["<revised_document>Dear Ms. Patel,\n\nWe accept.</revised_document>"],
        );
        let context = DocumentContext::new("retainer letter");
        let loop_config = LoopConfig::default();
        let logger = Logger::new(LogFormat::Compact);
        let settings = RunSettings {
            backends: &backends,
            context: &context,
            loop_config: &loop_config,
            logger: &logger,
            write_sessions: false,
        };

        let out_dir = dir.path().join("out");
        let output = refined_path(&input, Some(out_dir.as_path()));
        let report = process_document(0, &input, Some(output.clone()), &settings).await;

        assert!(report.error.is_none(), "{:?}", report.error);
        assert_eq!(report.output_path.as_deref(), Some(output.as_path()));
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "Dear Ms. Patel,\n\nWe accept.");
        let result = report.result.unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations.len(), 1);
    }

    #[tokio::test]
    async fn test_process_document_reports_failures() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("letter.md");
        std::fs::write(&input, "Dear Sir,").unwrap();

        let backends = backends(vec!["no json here"], vec![]);
        let context = DocumentContext::default();
        let loop_config = LoopConfig::default();
        let logger = Logger::new(LogFormat::Compact);
        let settings = RunSettings {
            backends: &backends,
            context: &context,
            loop_config: &loop_config,
            logger: &logger,
            write_sessions: false,
        };

        let report = process_document(0, &input, None, &settings).await;
        assert!(report.result.is_none());
        assert!(report.error.unwrap().contains("Critic failed"));

        let missing = process_document(1, &dir.path().join("missing.md"), None, &settings).await;
        assert!(missing.error.unwrap().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_critique_document_adds_missing_sections() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("letter.md");
        std::fs::write(&input, "## Fees\n\n$300/hr\n").unwrap();

        let backends = backends(vec![r#"{"overall_score": 0.7}"#], vec![]);
        let context = DocumentContext::new("retainer letter")
            .with_required_section("Fees")
            .with_required_section("Scope of Representation");
        let loop_config = LoopConfig::default();
        let logger = Logger::new(LogFormat::Compact);
        let settings = RunSettings {
            backends: &backends,
            context: &context,
            loop_config: &loop_config,
            logger: &logger,
            write_sessions: false,
        };

        let report = critique_document(0, &input, &settings).await;
        let critique = report.critique.unwrap();
        assert_eq!(critique.overall_score(), 0.7);
        assert!(critique.missing_sections().contains("Scope of Representation"));
        assert!(!critique.missing_sections().contains("Fees"));
    }

    #[tokio::test]
    async fn test_critique_document_rejects_blank_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("blank.md");
        std::fs::write(&input, "  \n\t\n").unwrap();

        // No scripted replies: any critic call would fail differently
        let backends = backends(vec![], vec![]);
        let context = DocumentContext::default();
        let loop_config = LoopConfig::default();
        let logger = Logger::new(LogFormat::Compact);
        let settings = RunSettings {
            backends: &backends,
            context: &context,
            loop_config: &loop_config,
            logger: &logger,
            write_sessions: false,
        };

        let report = critique_document(0, &input, &settings).await;
        assert!(report.critique.is_none());
        assert_eq!(report.error.as_deref(), Some("Document is empty"));
    }
}
