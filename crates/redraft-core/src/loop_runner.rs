use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use redraft_critic::{Critic, Critique, DocumentContext};
use redraft_logging::{LogEvent, Logger};
use redraft_refiner::{verify_protected_fields, ProtectedFieldViolation, Refiner};

use crate::error::Stage;
use crate::{IterationRecord, LoopConfig, LoopError, LoopResult, LoopState, StateMachine, StopReason};

/// Slack for float noise when comparing score gains, e.g. 0.15 - 0.1
const SCORE_TOLERANCE: f64 = 1e-9;

/// Drives a critic and a refiner over one document until it is good enough,
/// stops improving, or the pass budget runs out.
pub struct ReflectionLoop<'a> {
    critic: &'a dyn Critic,
    refiner: &'a dyn Refiner,
    logger: Arc<Logger>,
}

/// Mutable bookkeeping for one invocation
struct RunState {
    started: Instant,
    machine: StateMachine,
    records: Vec<IterationRecord>,
    trajectory: Vec<f64>,
}

impl<'a> ReflectionLoop<'a> {
    pub fn new(critic: &'a dyn Critic, refiner: &'a dyn Refiner, logger: Arc<Logger>) -> Self {
        Self {
            critic,
            refiner,
            logger,
        }
    }

    /// Run the loop over `text`.
    ///
    /// Only passes that call the refiner produce an [`IterationRecord`]; a
    /// critique that ends the loop shows up in `final_critique`,
    /// `score_trajectory` and `passes`. Any critic or refiner failure aborts
    /// the run without a partial result.
    pub async fn run(
        &self,
        text: &str,
        context: &DocumentContext,
        config: &LoopConfig,
    ) -> Result<LoopResult, LoopError> {
        config.validate()?;
        if text.trim().is_empty() {
            return Err(LoopError::EmptyDocument);
        }

        self.logger.log(&LogEvent::LoopStarted {
            document: context.label().to_string(),
            document_chars: text.chars().count(),
            max_iterations: config.max_iterations,
            quality_threshold: config.quality_threshold,
            min_improvement: config.min_improvement,
        });
        info!(
            document = context.label(),
            max_iterations = config.max_iterations,
            "Starting reflection loop"
        );

        let mut state = RunState {
            started: Instant::now(),
            machine: StateMachine::new(),
            records: Vec::new(),
            trajectory: Vec::new(),
        };
        let mut current_text = text.to_string();
        let mut previous_score: Option<f64> = None;
        let mut last_critique: Option<Critique> = None;

        for pass in 1..=config.max_iterations {
            let pass_started = Instant::now();

            self.logger.log(&LogEvent::CritiqueStarted { pass });
            let critique = match bounded(
                Stage::Critic,
                config.call_timeout,
                self.critic.critique(&current_text, context),
            )
            .await
            {
                Ok(critique) => critique,
                Err(e) => return Err(self.fail(&mut state, pass, e)),
            };

            let score = critique.overall_score();
            let delta = previous_score.map(|previous| score - previous);
            state.trajectory.push(score);

            self.logger.log(&LogEvent::CritiqueCompleted {
                pass,
                score,
                delta,
                issues: critique.issues().len(),
                missing_sections: critique.missing_sections().len(),
                duration_secs: pass_started.elapsed().as_secs_f64(),
            });
            debug!(pass, critique = %critique.short_description(), "Critique received");

            if score >= config.quality_threshold {
                self.logger.log(&LogEvent::QualityMet {
                    pass,
                    score,
                    threshold: config.quality_threshold,
                });
                state.machine.advance(LoopState::Converged)?;
                return Ok(self.finish(
                    state,
                    text,
                    current_text,
                    critique,
                    StopReason::QualityMet,
                    None,
                ));
            }

            if let Some(delta) = delta {
                if delta < config.min_improvement - SCORE_TOLERANCE {
                    self.logger.log(&LogEvent::NoImprovement {
                        pass,
                        delta,
                        min_improvement: config.min_improvement,
                    });
                    state.machine.advance(LoopState::Converged)?;
                    return Ok(self.finish(
                        state,
                        text,
                        current_text,
                        critique,
                        StopReason::NoImprovement,
                        None,
                    ));
                }
            }

            state.machine.advance(LoopState::Refining)?;
            self.logger.log(&LogEvent::RefineStarted { pass });
            let refine_started = Instant::now();
            let revised = match bounded(
                Stage::Refiner,
                config.call_timeout,
                self.refiner.refine(&current_text, &critique, context),
            )
            .await
            {
                Ok(revised) => revised,
                Err(e) => return Err(self.fail(&mut state, pass, e)),
            };

            self.logger.log(&LogEvent::RefineCompleted {
                pass,
                input_chars: current_text.chars().count(),
                output_chars: revised.chars().count(),
                duration_secs: refine_started.elapsed().as_secs_f64(),
            });

            if let Err(violation) = verify_protected_fields(context, &current_text, &revised) {
                warn!(pass, field = %violation.field, "Rejecting revision that altered a protected field");
                self.logger.log(&LogEvent::RevisionRejected {
                    pass,
                    field: violation.field.clone(),
                });
                state.machine.advance(LoopState::Converged)?;
                return Ok(self.finish(
                    state,
                    text,
                    current_text,
                    critique,
                    StopReason::NoImprovement,
                    Some(violation),
                ));
            }

            let input_text = std::mem::replace(&mut current_text, revised);
            state.records.push(IterationRecord {
                index: pass,
                input_text,
                critique: critique.clone(),
                output_text: current_text.clone(),
                score_delta: delta.unwrap_or(0.0),
                duration_secs: pass_started.elapsed().as_secs_f64(),
                timestamp: Utc::now(),
            });
            previous_score = Some(score);
            last_critique = Some(critique);

            if pass == config.max_iterations {
                state.machine.advance(LoopState::Exhausted)?;
            } else {
                state.machine.advance(LoopState::Critiquing)?;
            }
        }

        self.logger.log(&LogEvent::MaxIterationsReached {
            iterations: state.records.len(),
        });
        let final_critique = last_critique.ok_or_else(|| {
            LoopError::InvalidConfig("loop ran without a critique pass".to_string())
        })?;
        Ok(self.finish(
            state,
            text,
            current_text,
            final_critique,
            StopReason::MaxIterations,
            None,
        ))
    }

    fn fail(&self, state: &mut RunState, pass: usize, error: LoopError) -> LoopError {
        if let Err(e) = state.machine.advance(LoopState::Failed) {
            warn!(error = %e, "Unexpected state while failing");
        }
        warn!(pass, error = %error, "Reflection loop failed");
        self.logger.log(&LogEvent::ErrorEncountered {
            pass,
            error: error.to_string(),
        });
        error
    }

    fn finish(
        &self,
        state: RunState,
        original_text: &str,
        final_text: String,
        final_critique: Critique,
        stop_reason: StopReason,
        protected_field_violation: Option<ProtectedFieldViolation>,
    ) -> LoopResult {
        let total_duration_secs = state.started.elapsed().as_secs_f64();
        let passes = state.trajectory.len();

        self.logger.log(&LogEvent::LoopCompleted {
            stop_reason: stop_reason.to_string(),
            iterations: state.records.len(),
            passes,
            final_score: Some(final_critique.overall_score()),
            duration_secs: total_duration_secs,
        });
        info!(
            stop_reason = %stop_reason,
            iterations = state.records.len(),
            passes,
            final_score = final_critique.overall_score(),
            "Reflection loop finished"
        );

        LoopResult {
            original_text: original_text.to_string(),
            final_text,
            iterations: state.records,
            converged: stop_reason != StopReason::MaxIterations,
            stop_reason,
            passes,
            score_trajectory: state.trajectory,
            final_critique,
            protected_field_violation,
            state_trace: state.machine.into_trace(),
            total_duration_secs,
        }
    }
}

/// Await `call`, bounded by `limit` when one is set
async fn bounded<T, E, F>(stage: Stage, limit: Option<Duration>, call: F) -> Result<T, LoopError>
where
    F: Future<Output = Result<T, E>>,
    LoopError: From<E>,
{
    match limit {
        Some(after) => match tokio::time::timeout(after, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LoopError::Timeout { stage, after }),
        },
        None => Ok(call.await?),
    }
}
