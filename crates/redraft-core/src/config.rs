use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::LoopError;

pub const DEFAULT_MAX_ITERATIONS: usize = 3;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 0.05;

/// Stopping rules for one loop invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// Upper bound on critique passes, and therefore on refine passes
    pub max_iterations: usize,
    /// Score at or above which the document is accepted as is
    pub quality_threshold: f64,
    /// Smallest score gain between passes that counts as progress; 0 stops only on a regression
    pub min_improvement: f64,
    /// Limit on each critic or refiner call
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub call_timeout: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            call_timeout: None,
        }
    }
}

impl LoopConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.max_iterations < 1 {
            return Err(LoopError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        // Written so NaN fails too
        if !(self.quality_threshold > 0.0 && self.quality_threshold <= 1.0) {
            return Err(LoopError::InvalidConfig(format!(
                "quality_threshold must be in (0, 1], got {}",
                self.quality_threshold
            )));
        }
        if !(self.min_improvement >= 0.0 && self.min_improvement <= 1.0) {
            return Err(LoopError::InvalidConfig(format!(
                "min_improvement must be in [0, 1], got {}",
                self.min_improvement
            )));
        }
        if self.call_timeout == Some(Duration::ZERO) {
            return Err(LoopError::InvalidConfig(
                "call_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
