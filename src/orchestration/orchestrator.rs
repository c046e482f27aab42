//! # Lead Conversion Orchestrator
//!
//! Drives a [`LeadConversionSaga`] through its steps, checkpointing the saga
//! after every transition and compensating completed side effects when a
//! step fails.
//!
//! ## Key Features
//!
//! - **Resumable**: settled steps are never re-run, so a reloaded saga
//!   continues from its last durable checkpoint
//! - **Reverse-order compensation** of completed steps with a registered undo
//! - **Fail-fast persistence**: a failed checkpoint write aborts the operation
//! - **Bounded steps**: every handler call is limited by the step timeout and
//!   the request's cancellation token and deadline

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::context::RequestContext;
use super::errors::{SagaError, SagaResult, StepError, StepResult};
use super::handlers::StepOutcome;
use super::registry::{CompensationHandlerRegistry, SagaCollaborators, StepHandlerRegistry};
use crate::config::SagaConfig;
use crate::logging::{log_error, log_saga_operation, log_step_operation};
use crate::ports::SagaStore;
use crate::saga::{LeadConversionResult, LeadConversionSaga, StepType};
use crate::state_machine::{SagaState, SagaTransition, StateMachineError};

/// Why compensation stopped early
enum CompensationFailure {
    Handler { step: StepType, error: StepError },
    Saga(SagaError),
}

impl From<SagaError> for CompensationFailure {
    fn from(err: SagaError) -> Self {
        CompensationFailure::Saga(err)
    }
}

impl From<StateMachineError> for CompensationFailure {
    fn from(err: StateMachineError) -> Self {
        CompensationFailure::Saga(err.into())
    }
}

pub struct LeadConversionOrchestrator {
    store: Arc<dyn SagaStore>,
    step_handlers: StepHandlerRegistry,
    compensation_handlers: CompensationHandlerRegistry,
    step_timeout: Duration,
}

impl LeadConversionOrchestrator {
    pub fn new(
        store: Arc<dyn SagaStore>,
        collaborators: &SagaCollaborators,
        config: &SagaConfig,
    ) -> Self {
        Self::with_registries(
            store,
            StepHandlerRegistry::new(collaborators),
            CompensationHandlerRegistry::new(collaborators),
            config.step_timeout(),
        )
    }

    pub fn with_registries(
        store: Arc<dyn SagaStore>,
        step_handlers: StepHandlerRegistry,
        compensation_handlers: CompensationHandlerRegistry,
        step_timeout: Duration,
    ) -> Self {
        Self {
            store,
            step_handlers,
            compensation_handlers,
            step_timeout,
        }
    }

    pub fn step_handlers(&self) -> &StepHandlerRegistry {
        &self.step_handlers
    }

    pub fn compensation_handlers(&self) -> &CompensationHandlerRegistry {
        &self.compensation_handlers
    }

    /// Run the remaining steps of a saga to completion.
    ///
    /// On a step failure the saga is compensated and the step's error is
    /// returned, wrapped in [`SagaError::StepFailed`] or, when an undo also
    /// failed, [`SagaError::CompensationFailed`]. A request cancelled between
    /// steps compensates the same way and returns [`SagaError::Interrupted`];
    /// one cancelled during a step fails that step. A terminal saga is rejected
    /// without touching any collaborator.
    #[instrument(skip_all, fields(saga_id = %saga.id, lead_id = %saga.lead_id, tenant_id = %saga.tenant_id))]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        saga: &mut LeadConversionSaga,
    ) -> SagaResult<LeadConversionResult> {
        match saga.state() {
            state if state.is_terminal() => {
                return Err(SagaError::AlreadyTerminal {
                    saga_id: saga.id,
                    state,
                });
            }
            SagaState::Compensating => {
                return Err(StateMachineError::InvalidTransition {
                    from: SagaState::Compensating,
                    event: SagaTransition::Start,
                }
                .into());
            }
            SagaState::Started => {
                saga.start()?;
                self.save_saga(saga).await?;
                log_saga_operation("start", Some(saga.id), Some(saga.lead_id), "running", None);
            }
            _ => {
                debug!(summary = %saga.summary(), "Continuing saga from checkpoint");
            }
        }

        while let Some(index) = saga.current_step_index() {
            let step_type = saga.steps()[index].step_type;

            if let Err(error) = check_context(ctx) {
                return Err(self.interrupt_and_compensate(ctx, saga, step_type, error).await);
            }

            saga.start_step(index);
            self.save_saga(saga).await?;
            debug!(step_type = %step_type, "Executing saga step");

            match self.run_step(ctx, saga, step_type).await {
                Ok(outcome) => {
                    saga.record_events(outcome.events);
                    saga.complete_step(index, outcome.output);
                    self.save_saga(saga).await?;
                    log_step_operation(
                        "execute",
                        Some(saga.id),
                        Some(step_type.as_str()),
                        "completed",
                        None,
                    );
                }
                Err(error) => {
                    return Err(self.fail_and_compensate(ctx, saga, index, step_type, error).await);
                }
            }
        }

        let converted_at = Utc::now();
        let result = saga
            .build_result(converted_at)
            .ok_or(SagaError::MissingStepOutput {
                saga_id: saga.id,
                step: StepType::CreateOpportunity,
            })?;
        saga.complete(result.clone())?;
        self.save_saga(saga).await?;

        info!(
            opportunity_id = %result.opportunity_id,
            customer_created = result.customer_created,
            conversion_time_ms = result.conversion_time_ms,
            "Lead conversion saga completed"
        );
        Ok(result)
    }

    /// Undo the completed steps of a saga in `Compensating`
    #[instrument(skip_all, fields(saga_id = %saga.id, lead_id = %saga.lead_id, tenant_id = %saga.tenant_id))]
    pub async fn compensate(
        &self,
        ctx: &RequestContext,
        saga: &mut LeadConversionSaga,
    ) -> SagaResult<()> {
        if saga.state() != SagaState::Compensating {
            return Err(SagaError::NotCompensating {
                saga_id: saga.id,
                state: saga.state(),
            });
        }

        match self.run_compensation(ctx, saga).await {
            Ok(()) => Ok(()),
            Err(CompensationFailure::Handler { step, error }) => {
                Err(SagaError::CompensationFailed {
                    failed_step: saga.failed_step_type().unwrap_or(step),
                    original: StepError::Recorded(
                        saga.failure_reason().unwrap_or_default().to_string(),
                    ),
                    compensation_step: step,
                    compensation: error,
                })
            }
            Err(CompensationFailure::Saga(err)) => Err(err),
        }
    }

    /// Continue a saga from whatever state it was checkpointed in.
    ///
    /// Terminal sagas are left untouched.
    pub async fn resume(&self, ctx: &RequestContext, saga: &mut LeadConversionSaga) -> SagaResult<()> {
        match saga.state() {
            SagaState::Started | SagaState::Running => self.execute(ctx, saga).await.map(|_| ()),
            SagaState::Compensating => self.compensate(ctx, saga).await,
            SagaState::Completed | SagaState::Compensated | SagaState::Failed => {
                debug!(saga_id = %saga.id, state = %saga.state(), "Saga already terminal; nothing to resume");
                Ok(())
            }
        }
    }

    pub async fn get_saga_status(
        &self,
        tenant_id: Uuid,
        saga_id: Uuid,
    ) -> SagaResult<LeadConversionSaga> {
        self.store
            .get_by_id(tenant_id, saga_id)
            .await?
            .ok_or(SagaError::NotFound { tenant_id, saga_id })
    }

    async fn run_step(
        &self,
        ctx: &RequestContext,
        saga: &LeadConversionSaga,
        step_type: StepType,
    ) -> StepResult<StepOutcome> {
        let handler = self.step_handlers.handler_for(step_type);
        // a cancelled or expired request drops the handler future mid-call
        tokio::select! {
            result = tokio::time::timeout(self.step_timeout, handler.execute(ctx, saga)) => {
                result.unwrap_or_else(|_| Err(self.timeout_error()))
            }
            _ = ctx.cancellation.cancelled() => Err(StepError::Cancelled),
            _ = ctx.deadline_reached() => Err(StepError::DeadlineExceeded),
        }
    }

    /// Compensate a saga whose request stopped before `next_step` started
    async fn interrupt_and_compensate(
        &self,
        ctx: &RequestContext,
        saga: &mut LeadConversionSaga,
        next_step: StepType,
        error: StepError,
    ) -> SagaError {
        warn!(next_step = %next_step, error = %error, "Saga request stopped between steps; starting compensation");

        if let Err(err) = saga.interrupt(&error) {
            return err.into();
        }
        if let Err(err) = self.enter_compensation(saga, &error).await {
            return err;
        }

        match self.run_compensation(ctx, saga).await {
            Ok(()) => SagaError::Interrupted {
                next_step,
                source: error,
            },
            Err(CompensationFailure::Handler {
                step,
                error: compensation,
            }) => SagaError::CompensationFailed {
                failed_step: next_step,
                original: error,
                compensation_step: step,
                compensation,
            },
            Err(CompensationFailure::Saga(err)) => err,
        }
    }

    async fn fail_and_compensate(
        &self,
        ctx: &RequestContext,
        saga: &mut LeadConversionSaga,
        index: usize,
        step_type: StepType,
        error: StepError,
    ) -> SagaError {
        warn!(step_type = %step_type, error = %error, "Saga step failed; starting compensation");

        saga.fail_step(index, &error);
        if let Err(err) = saga.start_compensation(&error, step_type) {
            return err.into();
        }
        if let Err(err) = self.enter_compensation(saga, &error).await {
            return err;
        }

        match self.run_compensation(ctx, saga).await {
            Ok(()) => SagaError::StepFailed {
                step: step_type,
                source: error,
            },
            Err(CompensationFailure::Handler {
                step,
                error: compensation,
            }) => SagaError::CompensationFailed {
                failed_step: step_type,
                original: error,
                compensation_step: step,
                compensation,
            },
            Err(CompensationFailure::Saga(err)) => err,
        }
    }

    async fn run_compensation(
        &self,
        ctx: &RequestContext,
        saga: &mut LeadConversionSaga,
    ) -> Result<(), CompensationFailure> {
        for index in saga.completed_steps_in_reverse() {
            let step_type = saga.steps()[index].step_type;
            let Some(handler) = self.compensation_handlers.compensation_for(step_type) else {
                debug!(step_type = %step_type, "Read-only step; nothing to compensate");
                continue;
            };

            let step = &saga.steps()[index];
            let outcome =
                match tokio::time::timeout(self.step_timeout, handler.compensate(ctx, saga, step))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(self.timeout_error()),
                };

            match outcome {
                Ok(note) => {
                    saga.compensate_step(index, note);
                    self.save_saga(saga).await?;
                    log_step_operation(
                        "compensate",
                        Some(saga.id),
                        Some(step_type.as_str()),
                        "compensated",
                        None,
                    );
                }
                Err(error) => {
                    log_error(
                        "orchestrator",
                        "compensate",
                        &error.to_string(),
                        Some(step_type.as_str()),
                    );
                    saga.fail(&error, step_type)?;
                    self.save_saga(saga).await?;
                    error!(summary = %saga.summary(), "Saga compensation failed; manual review required");
                    return Err(CompensationFailure::Handler {
                        step: step_type,
                        error,
                    });
                }
            }
        }

        saga.mark_compensated()?;
        self.save_saga(saga).await?;
        log_saga_operation(
            "compensated",
            Some(saga.id),
            Some(saga.lead_id),
            "compensated",
            None,
        );
        Ok(())
    }

    async fn enter_compensation(
        &self,
        saga: &mut LeadConversionSaga,
        error: &StepError,
    ) -> SagaResult<()> {
        self.save_saga(saga).await?;
        log_saga_operation(
            "start_compensation",
            Some(saga.id),
            Some(saga.lead_id),
            "compensating",
            Some(&error.to_string()),
        );
        Ok(())
    }

    /// Checkpoint the saga; a failed write aborts the caller's operation
    async fn save_saga(&self, saga: &mut LeadConversionSaga) -> SagaResult<()> {
        self.store.update(saga).await.map_err(|err| {
            log_error(
                "orchestrator",
                "save_saga",
                &err.to_string(),
                Some(&saga.summary()),
            );
            SagaError::Persistence(err)
        })
    }

    fn timeout_error(&self) -> StepError {
        StepError::Timeout {
            timeout_ms: u64::try_from(self.step_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn check_context(ctx: &RequestContext) -> StepResult<()> {
    if ctx.is_cancelled() {
        return Err(StepError::Cancelled);
    }
    if ctx.is_expired() {
        return Err(StepError::DeadlineExceeded);
    }
    Ok(())
}
