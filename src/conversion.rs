//! # Lead Conversion Use Case
//!
//! Entry point for converting a lead: deduplicates requests by idempotency
//! key, creates and checkpoints the saga, runs it, and maps the saga's final
//! state to a caller-facing [`ConversionOutcome`].

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::SagaConfig;
use crate::orchestration::{LeadConversionOrchestrator, RequestContext, SagaError, SagaResult};
use crate::ports::{DomainEventPublisher, SagaStore, StoreError};
use crate::saga::{
    generate_idempotency_key, LeadConversionRequest, LeadConversionResult, LeadConversionSaga,
};
use crate::state_machine::SagaState;

/// Caller-facing result of a conversion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted(LeadConversionResult),
    /// The conversion failed and every side effect was undone
    FailedNoChanges { saga_id: Uuid, reason: String },
    /// The conversion failed and could not be fully undone
    FailedManualReview { saga_id: Uuid, reason: String },
    /// Another request for the same conversion is still running
    InProgress { saga_id: Uuid, state: SagaState },
}

impl ConversionOutcome {
    /// Outcome implied by a saga's persisted state
    pub fn from_saga(saga: &LeadConversionSaga) -> Self {
        let reason = || {
            saga.compensation_error()
                .or(saga.failure_reason())
                .unwrap_or_default()
                .to_string()
        };
        match (saga.state(), saga.result()) {
            (SagaState::Completed, Some(result)) => Self::Converted(result.clone()),
            (SagaState::Compensated, _) => Self::FailedNoChanges {
                saga_id: saga.id,
                reason: reason(),
            },
            (SagaState::Failed, _) => Self::FailedManualReview {
                saga_id: saga.id,
                reason: reason(),
            },
            (state, _) => Self::InProgress {
                saga_id: saga.id,
                state,
            },
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

pub struct LeadConversionService {
    orchestrator: Arc<LeadConversionOrchestrator>,
    store: Arc<dyn SagaStore>,
    publisher: Option<Arc<dyn DomainEventPublisher>>,
    config: SagaConfig,
}

impl LeadConversionService {
    pub fn new(
        orchestrator: Arc<LeadConversionOrchestrator>,
        store: Arc<dyn SagaStore>,
        config: SagaConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            publisher: None,
            config,
        }
    }

    /// Publish saga events still queued once a run finishes
    pub fn with_publisher(mut self, publisher: Arc<dyn DomainEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Convert a lead, reusing an existing saga for the same request window
    #[instrument(skip_all, fields(tenant_id = %ctx.tenant_id, lead_id = %lead_id))]
    pub async fn convert_lead(
        &self,
        ctx: &RequestContext,
        lead_id: Uuid,
        request: LeadConversionRequest,
    ) -> SagaResult<ConversionOutcome> {
        let key = generate_idempotency_key(
            ctx.tenant_id,
            lead_id,
            ctx.actor_id,
            Utc::now(),
            self.config.idempotency_window(),
        );

        if let Some(existing) = self.store.get_by_idempotency_key(ctx.tenant_id, &key).await? {
            info!(saga_id = %existing.id, state = %existing.state(), "Reusing saga for idempotent request");
            return Ok(ConversionOutcome::from_saga(&existing));
        }

        let mut saga = LeadConversionSaga::new(ctx.tenant_id, lead_id, key, ctx.actor_id, request);
        match self.store.create(&mut saga).await {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey { key, .. }) => {
                // lost the race to a concurrent identical request
                return match self.store.get_by_idempotency_key(ctx.tenant_id, &key).await? {
                    Some(existing) => Ok(ConversionOutcome::from_saga(&existing)),
                    None => Err(StoreError::DuplicateIdempotencyKey {
                        key,
                        saga_id: saga.id,
                    }
                    .into()),
                };
            }
            Err(err) => return Err(err.into()),
        }

        let result = self.orchestrator.execute(ctx, &mut saga).await;
        let flushed = self.flush_events(&mut saga).await;
        let outcome = Self::outcome(&saga, result.map(|_| ()))?;
        flushed?;
        Ok(outcome)
    }

    /// Resume a previously started conversion
    pub async fn retry(&self, ctx: &RequestContext, saga_id: Uuid) -> SagaResult<ConversionOutcome> {
        let mut saga = self
            .orchestrator
            .get_saga_status(ctx.tenant_id, saga_id)
            .await?;

        let result = self.orchestrator.resume(ctx, &mut saga).await;
        let flushed = self.flush_events(&mut saga).await;
        let outcome = Self::outcome(&saga, result)?;
        flushed?;
        Ok(outcome)
    }

    pub async fn status(&self, tenant_id: Uuid, saga_id: Uuid) -> SagaResult<ConversionOutcome> {
        let saga = self.orchestrator.get_saga_status(tenant_id, saga_id).await?;
        Ok(ConversionOutcome::from_saga(&saga))
    }

    fn outcome(saga: &LeadConversionSaga, result: SagaResult<()>) -> SagaResult<ConversionOutcome> {
        match result {
            Ok(()) => Ok(ConversionOutcome::from_saga(saga)),
            Err(err) if err.is_compensated_failure() => Ok(ConversionOutcome::FailedNoChanges {
                saga_id: saga.id,
                reason: err.to_string(),
            }),
            Err(err @ SagaError::CompensationFailed { .. }) => {
                Ok(ConversionOutcome::FailedManualReview {
                    saga_id: saga.id,
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Hand events raised after the publish step to the publisher.
    ///
    /// A failure is reported as [`SagaError::EventsNotPublished`]; the saga's
    /// own state is already durable and readable through [`status`](Self::status).
    async fn flush_events(&self, saga: &mut LeadConversionSaga) -> SagaResult<()> {
        let Some(publisher) = &self.publisher else {
            return Ok(());
        };
        let events = saga.take_events();
        if events.is_empty() {
            return Ok(());
        }
        let count = events.len();
        publisher.publish(events).await.map_err(|source| {
            warn!(
                saga_id = %saga.id,
                count = count,
                error = %source,
                "Failed to publish trailing saga events"
            );
            SagaError::EventsNotPublished {
                saga_id: saga.id,
                count,
                source,
            }
        })
    }
}
