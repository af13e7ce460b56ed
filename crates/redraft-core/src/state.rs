//! Controller states and the legal edges between them.
//!
//! ```text
//! Critiquing → Refining | Converged | Exhausted | Failed
//! Refining   → Critiquing | Converged | Exhausted | Failed
//! ```
//!
//! `Converged`, `Exhausted` and `Failed` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Waiting on the critic
    Critiquing,
    /// Waiting on the refiner
    Refining,
    /// Stopped early: quality met, stalled, or revision rejected
    Converged,
    /// Iteration cap reached
    Exhausted,
    /// A critic or refiner call failed
    Failed,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Failed)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critiquing => write!(f, "Critiquing"),
            Self::Refining => write!(f, "Refining"),
            Self::Converged => write!(f, "Converged"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

pub fn is_legal_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::*;

    matches!(
        (from, to),
        (Critiquing, Refining | Converged | Exhausted | Failed)
            | (Refining, Critiquing | Converged | Exhausted | Failed)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal state transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: LoopState,
    pub to: LoopState,
}

/// Tracks the current state and every state visited
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: LoopState,
    trace: Vec<LoopState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: LoopState::Critiquing,
            trace: vec![LoopState::Critiquing],
        }
    }

    pub fn current(&self) -> LoopState {
        self.current
    }

    pub fn trace(&self) -> &[LoopState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<LoopState> {
        self.trace
    }

    pub fn advance(&mut self, to: LoopState) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }
        tracing::trace!(from = %self.current, to = %to, "State transition");
        self.current = to;
        self.trace.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoopState::*;

    #[test]
    fn test_terminal_states() {
        assert!(!Critiquing.is_terminal());
        assert!(!Refining.is_terminal());
        assert!(Converged.is_terminal());
        assert!(Exhausted.is_terminal());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn test_no_edges_leave_terminal_states() {
        let all = [Critiquing, Refining, Converged, Exhausted, Failed];
        for from in [Converged, Exhausted, Failed] {
            for to in all {
                assert!(!is_legal_transition(from, to), "{} → {}", from, to);
            }
        }
    }

    #[test]
    fn test_self_loops_are_illegal() {
        assert!(!is_legal_transition(Critiquing, Critiquing));
        assert!(!is_legal_transition(Refining, Refining));
    }

    #[test]
    fn test_machine_records_trace() {
        let mut machine = StateMachine::new();
        machine.advance(Refining).unwrap();
        machine.advance(Critiquing).unwrap();
        machine.advance(Converged).unwrap();
        assert_eq!(machine.current(), Converged);
        assert_eq!(
            machine.trace(),
            &[Critiquing, Refining, Critiquing, Converged]
        );

        let err = machine.advance(Critiquing).unwrap_err();
        assert_eq!(err.from, Converged);
        assert_eq!(machine.trace().len(), 4);
    }
}
