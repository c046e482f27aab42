//! # Step Handlers
//!
//! One forward handler per [`StepType`](crate::saga::StepType) and one
//! compensation handler per step with a side effect. Handlers read the saga
//! but never mutate it: they return a typed [`StepOutcome`] which the
//! orchestrator folds into the saga and checkpoints.

use async_trait::async_trait;

use super::context::RequestContext;
use super::errors::StepResult;
use crate::events::DomainEvent;
use crate::saga::{LeadConversionSaga, SagaStep, StepOutput};

pub mod customer;
pub mod mark_converted;
pub mod opportunity;
pub mod publish_events;
pub mod validate_lead;

pub use customer::{CreateCustomerCompensation, CreateCustomerHandler, LookupCustomerHandler};
pub use mark_converted::{MarkLeadConvertedCompensation, MarkLeadConvertedHandler};
pub use opportunity::{CreateOpportunityCompensation, CreateOpportunityHandler};
pub use publish_events::{PublishEventsCompensation, PublishEventsHandler};
pub use validate_lead::ValidateLeadHandler;

/// What a successful forward step produced
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub output: StepOutput,
    /// Domain events raised by collaborating aggregates, queued for publishing
    pub events: Vec<DomainEvent>,
}

impl StepOutcome {
    pub fn new(output: StepOutput) -> Self {
        Self {
            output,
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<DomainEvent>) -> Self {
        self.events = events;
        self
    }
}

impl From<StepOutput> for StepOutcome {
    fn from(output: StepOutput) -> Self {
        Self::new(output)
    }
}

/// Forward execution of one step
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &RequestContext,
        saga: &LeadConversionSaga,
    ) -> StepResult<StepOutcome>;
}

/// Undo of one completed step.
///
/// Returns an optional note recorded on the step.
#[async_trait]
pub trait CompensationHandler: Send + Sync {
    async fn compensate(
        &self,
        ctx: &RequestContext,
        saga: &LeadConversionSaga,
        step: &SagaStep,
    ) -> StepResult<Option<String>>;
}
