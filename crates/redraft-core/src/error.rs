use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::IllegalTransition;

/// Which side of the loop a call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Critic,
    Refiner,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critic => write!(f, "critic"),
            Self::Refiner => write!(f, "refiner"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Invalid loop configuration: {0}")]
    InvalidConfig(String),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("Critic failed: {0}")]
    CriticError(#[from] redraft_critic::CriticError),

    #[error("Refiner failed: {0}")]
    RefinerError(#[from] redraft_refiner::RefinerError),

    #[error("The {stage} call timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl LoopError {
    /// Stage the failure came from, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::CriticError(_) => Some(Stage::Critic),
            Self::RefinerError(_) => Some(Stage::Refiner),
            Self::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
