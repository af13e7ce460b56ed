use serde::{Deserialize, Serialize};
use std::fmt;

use redraft_critic::Critique;
use redraft_refiner::ProtectedFieldViolation;

use crate::{IterationRecord, LoopState};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    QualityMet,
    NoImprovement,
    MaxIterations,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QualityMet => "quality_met",
            Self::NoImprovement => "no_improvement",
            Self::MaxIterations => "max_iterations",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one loop invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopResult {
    pub original_text: String,
    pub final_text: String,
    /// One record per refine pass, in order
    pub iterations: Vec<IterationRecord>,
    pub converged: bool,
    pub stop_reason: StopReason,
    /// Number of critic calls
    pub passes: usize,
    /// Every critique score in call order
    pub score_trajectory: Vec<f64>,
    pub final_critique: Critique,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_field_violation: Option<ProtectedFieldViolation>,
    pub state_trace: Vec<LoopState>,
    pub total_duration_secs: f64,
}

impl LoopResult {
    pub fn final_score(&self) -> f64 {
        self.final_critique.overall_score()
    }

    /// Whether any refine pass changed the text
    pub fn changed(&self) -> bool {
        self.final_text != self.original_text
    }

    pub fn exit_code(&self) -> i32 {
        match self.stop_reason {
            StopReason::QualityMet | StopReason::NoImprovement => 0,
            StopReason::MaxIterations => 1,
        }
    }
}
