//! # redraft-core
//!
//! The bounded critique-and-refine loop. A [`ReflectionLoop`] asks a
//! [`Critic`] to score a document, hands the critique to a [`Refiner`], and
//! repeats until the score clears the threshold, stops improving, or the
//! pass budget in [`LoopConfig`] is spent.

mod config;
mod error;
mod loop_runner;
mod outcome;
mod record;
mod state;

pub use config::{
    LoopConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_IMPROVEMENT, DEFAULT_QUALITY_THRESHOLD,
};
pub use error::{LoopError, Stage};
pub use loop_runner::ReflectionLoop;
pub use outcome::{LoopResult, StopReason};
pub use record::IterationRecord;
pub use state::{is_legal_transition, IllegalTransition, LoopState, StateMachine};

pub use redraft_critic::{Critic, Critique, DocumentContext};
pub use redraft_refiner::{ProtectedFieldViolation, Refiner};
