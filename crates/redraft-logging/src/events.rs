use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Role of the agent producing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Critic,
    Refiner,
}

/// Type of output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Stdout,
    Stderr,
}

/// Structured log events for the reflection loop. `pass` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    LoopStarted {
        document: String,
        document_chars: usize,
        max_iterations: usize,
        quality_threshold: f64,
        min_improvement: f64,
    },
    CritiqueStarted {
        pass: usize,
    },
    CritiqueCompleted {
        pass: usize,
        score: f64,
        delta: Option<f64>,
        issues: usize,
        missing_sections: usize,
        duration_secs: f64,
    },
    RefineStarted {
        pass: usize,
    },
    RefineCompleted {
        pass: usize,
        input_chars: usize,
        output_chars: usize,
        duration_secs: f64,
    },
    /// Streaming output line from an agent
    AgentStreamLine {
        role: AgentRole,
        stream: StreamType,
        line: String,
    },
    RevisionRejected {
        pass: usize,
        field: String,
    },
    QualityMet {
        pass: usize,
        score: f64,
        threshold: f64,
    },
    NoImprovement {
        pass: usize,
        delta: f64,
        min_improvement: f64,
    },
    MaxIterationsReached {
        iterations: usize,
    },
    LoopCompleted {
        stop_reason: String,
        iterations: usize,
        passes: usize,
        final_score: Option<f64>,
        duration_secs: f64,
    },
    ErrorEncountered {
        pass: usize,
        error: String,
    },
}

impl LogEvent {
    fn to_json(&self, scope: Option<&str>, timestamp: bool) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            if let Some(scope) = scope {
                obj.insert("scope".to_string(), serde_json::Value::String(scope.to_string()));
            }
            if timestamp {
                obj.insert(
                    "timestamp".to_string(),
                    serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
                );
            }
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for loop events; writes to stderr and optionally to a JSONL file.
///
/// Cloning is cheap and clones share the file handle, so one logger can be
/// scoped per document when several documents run at once.
#[derive(Clone)]
pub struct Logger {
    format: LogFormat,
    scope: Option<String>,
    file_writer: Option<Arc<Mutex<File>>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            scope: None,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            scope: None,
            file_writer: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// A logger that tags every event with `scope` (e.g. the input file name)
    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            format: self.format,
            scope: Some(scope.into()),
            file_writer: self.file_writer.clone(),
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.to_json(self.scope.as_deref(), true);
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        let json = event.to_json(self.scope.as_deref(), false);
        let _ = writeln!(std::io::stderr(), "{}", json);
    }

    fn prefix(&self) -> String {
        match self.scope {
            Some(ref scope) => format!("{} ", format!("[{}]", scope).dimmed()),
            None => String::new(),
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let prefix = self.prefix();
        match event {
            LogEvent::LoopStarted {
                document,
                document_chars,
                max_iterations,
                quality_threshold,
                min_improvement,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}{}",
                    prefix,
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}{}  {}{}",
                    prefix,
                    "│".bright_blue(),
                    "redraft".bold().bright_white(),
                    " ".repeat(60) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}{}  {} {}",
                    prefix,
                    "│".bright_blue(),
                    "Document:".dimmed(),
                    Self::truncate_with_padding(
                        &format!("{} ({} chars)", document, document_chars),
                        56,
                        66
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}{}  {} {}",
                    prefix,
                    "│".bright_blue(),
                    "Limits:".dimmed(),
                    Self::truncate_with_padding(
                        &format!(
                            "max {} passes, threshold {:.2}, min gain {:.2}",
                            max_iterations, quality_threshold, min_improvement
                        ),
                        58,
                        68
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}{}",
                    prefix,
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::CritiqueStarted { pass } => {
                let pass_text = format!("─ Pass {} ", pass);
                let padding = "─".repeat(67usize.saturating_sub(pass_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}{}",
                    prefix,
                    "┌".bright_blue(),
                    pass_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    prefix,
                    "▶".bright_magenta(),
                    "CRITIC".bright_magenta().bold()
                );
            }
            LogEvent::CritiqueCompleted {
                score,
                delta,
                issues,
                missing_sections,
                duration_secs,
                ..
            } => {
                let delta_text = match delta {
                    Some(d) if *d >= 0.0 => format!(" {}", format!("+{:.2}", d).green()),
                    Some(d) => format!(" {}", format!("{:.2}", d).red()),
                    None => String::new(),
                };
                let _ = writeln!(
                    stderr,
                    "{}    {} Score {:.2}{} · {} {} · {} missing ({:.1}s)",
                    prefix,
                    "✓".bright_green(),
                    score,
                    delta_text,
                    issues,
                    if *issues == 1 { "issue" } else { "issues" },
                    missing_sections,
                    duration_secs
                );
            }
            LogEvent::RefineStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    prefix,
                    "▶".bright_cyan(),
                    "REFINER".bright_cyan().bold()
                );
            }
            LogEvent::RefineCompleted {
                input_chars,
                output_chars,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{}    {} Revised {} → {} chars ({:.1}s)",
                    prefix,
                    "✓".bright_green(),
                    input_chars,
                    output_chars,
                    duration_secs
                );
                let _ = writeln!(
                    stderr,
                    "{}{}",
                    prefix,
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RevisionRejected { pass, field } => {
                let _ = writeln!(
                    stderr,
                    "{}    {} Revision {} rejected: protected field '{}' was altered",
                    prefix,
                    "✗".bright_red(),
                    pass,
                    field
                );
            }
            LogEvent::QualityMet {
                score, threshold, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{}    {}",
                    prefix,
                    format!("✓ Quality met ({:.2} ≥ {:.2})", score, threshold).bright_green()
                );
            }
            LogEvent::NoImprovement {
                delta,
                min_improvement,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{}    {}",
                    prefix,
                    format!(
                        "→ No improvement ({:+.2} < {:.2})",
                        delta, min_improvement
                    )
                    .bright_yellow()
                );
            }
            LogEvent::MaxIterationsReached { iterations } => {
                let _ = writeln!(
                    stderr,
                    "{}{} Maximum iterations reached ({})",
                    prefix,
                    "⚠".bright_yellow(),
                    iterations
                );
            }
            LogEvent::LoopCompleted { .. } => {
                // Final summary is printed by the CLI
            }
            LogEvent::ErrorEncountered { pass, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}{} Error in pass {}: {}",
                    prefix,
                    "✗".bright_red(),
                    pass,
                    error.bright_red()
                );
            }
            LogEvent::AgentStreamLine { line, stream, .. } => {
                let bar = "    │".dimmed();
                let styled_line = match stream {
                    StreamType::Stdout => line.normal(),
                    StreamType::Stderr => line.dimmed(),
                };
                let _ = writeln!(stderr, "{}{} {}", prefix, bar, styled_line);
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let Some(msg) = Self::compact_line(event) else {
            return;
        };
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let scope = self
            .scope
            .as_ref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default();
        let _ = writeln!(std::io::stderr(), "[{}]{} {}", timestamp, scope, msg);
    }

    /// Compact rendering without timestamp; None for events not shown in compact mode
    pub fn compact_line(event: &LogEvent) -> Option<String> {
        let msg = match event {
            LogEvent::LoopStarted {
                document_chars,
                max_iterations,
                ..
            } => format!("loop:start chars={} max={}", document_chars, max_iterations),
            LogEvent::CritiqueStarted { pass } => format!("critic:start:{}", pass),
            LogEvent::CritiqueCompleted {
                pass,
                score,
                issues,
                ..
            } => format!("critic:done:{} score={:.2} issues={}", pass, score, issues),
            LogEvent::RefineStarted { pass } => format!("refiner:start:{}", pass),
            LogEvent::RefineCompleted {
                pass,
                output_chars,
                duration_secs,
                ..
            } => format!(
                "refiner:done:{} chars={} {:.1}s",
                pass, output_chars, duration_secs
            ),
            LogEvent::RevisionRejected { pass, field } => {
                format!("refiner:rejected:{} field={}", pass, field)
            }
            LogEvent::QualityMet { pass, score, .. } => {
                format!("loop:quality_met:{} score={:.2}", pass, score)
            }
            LogEvent::NoImprovement { pass, delta, .. } => {
                format!("loop:no_improvement:{} delta={:+.2}", pass, delta)
            }
            LogEvent::MaxIterationsReached { iterations } => {
                format!("loop:limit:{}", iterations)
            }
            LogEvent::LoopCompleted {
                stop_reason,
                iterations,
                duration_secs,
                ..
            } => format!(
                "loop:done:{} {} {:.1}s",
                iterations, stop_reason, duration_secs
            ),
            LogEvent::ErrorEncountered { pass, error } => format!("error:{}:{}", pass, error),
            LogEvent::AgentStreamLine { role, line, .. } => {
                let role_str = match role {
                    AgentRole::Critic => "C",
                    AgentRole::Refiner => "R",
                };
                format!("{}:{}", role_str, line)
            }
        };
        Some(msg)
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LogEvent::QualityMet {
            pass: 3,
            score: 0.9,
            threshold: 0.85,
        };
        let json = event.to_json(Some("letter.md"), false);
        assert_eq!(json["event"], "quality_met");
        assert_eq!(json["pass"], 3);
        assert_eq!(json["scope"], "letter.md");
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_compact_lines() {
        let line = Logger::compact_line(&LogEvent::CritiqueCompleted {
            pass: 2,
            score: 0.7,
            delta: Some(0.2),
            issues: 4,
            missing_sections: 0,
            duration_secs: 1.0,
        });
        assert_eq!(line.as_deref(), Some("critic:done:2 score=0.70 issues=4"));

        let line = Logger::compact_line(&LogEvent::NoImprovement {
            pass: 2,
            delta: -0.05,
            min_improvement: 0.05,
        });
        assert_eq!(line.as_deref(), Some("loop:no_improvement:2 delta=-0.05"));
    }

    #[test]
    fn test_file_output_is_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        let scoped = logger.scoped("a.md");

        logger.log(&LogEvent::CritiqueStarted { pass: 1 });
        scoped.log(&LogEvent::MaxIterationsReached { iterations: 3 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "critique_started");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["scope"], "a.md");
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("abc", 10, 8);
        assert_eq!(padded, "abc    │");
        let truncated = Logger::truncate_with_padding("abcdefghijkl", 6, 8);
        assert_eq!(truncated, "abc... │");
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
