use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{CompensationHandler, StepHandler, StepOutcome};
use crate::orchestration::context::RequestContext;
use crate::orchestration::errors::StepResult;
use crate::ports::DomainEventPublisher;
use crate::saga::{LeadConversionSaga, SagaStep, StepOutput};

/// Hands the events queued on the saga to the publisher.
///
/// Without a publisher the events stay queued for the caller.
pub struct PublishEventsHandler {
    publisher: Option<Arc<dyn DomainEventPublisher>>,
}

impl PublishEventsHandler {
    pub fn new(publisher: Option<Arc<dyn DomainEventPublisher>>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl StepHandler for PublishEventsHandler {
    async fn execute(
        &self,
        _ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome> {
        let events = saga.pending_events().to_vec();
        let count = events.len();

        let Some(publisher) = &self.publisher else {
            debug!(saga_id = %saga.id, pending = count, "No event publisher configured");
            return Ok(StepOutput::EventsPublished {
                published: 0,
                pending: count,
            }
            .into());
        };

        if count > 0 {
            publisher.publish(events).await?;
        }
        debug!(saga_id = %saga.id, published = count, "Conversion events published");

        Ok(StepOutput::EventsPublished {
            published: count,
            pending: 0,
        }
        .into())
    }
}

/// Published events are not retracted
pub struct PublishEventsCompensation;

#[async_trait]
impl CompensationHandler for PublishEventsCompensation {
    async fn compensate(
        &self,
        _ctx: &RequestContext,
        _saga: &LeadConversionSaga,
        _step: &SagaStep,
    ) -> StepResult<Option<String>> {
        Ok(None)
    }
}
