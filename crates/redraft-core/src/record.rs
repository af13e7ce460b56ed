use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use redraft_critic::Critique;
use redraft_logging::SessionIteration;

/// Record of a single refine pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based pass number
    pub index: usize,
    pub input_text: String,
    /// Critique of `input_text` that drove this revision
    pub critique: Critique,
    pub output_text: String,
    /// Score change from the previous record; 0 for the first
    pub score_delta: f64,
    /// Critic plus refiner time for this pass
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    pub fn score(&self) -> f64 {
        self.critique.overall_score()
    }
}

impl From<&IterationRecord> for SessionIteration {
    fn from(record: &IterationRecord) -> Self {
        SessionIteration {
            index: record.index,
            score: record.score(),
            score_delta: record.score_delta,
            issues: record.critique.issues().len(),
            missing_sections: record.critique.missing_sections().iter().cloned().collect(),
            input_chars: record.input_text.chars().count(),
            output_chars: record.output_text.chars().count(),
            duration_secs: record.duration_secs,
            timestamp: record.timestamp,
        }
    }
}
