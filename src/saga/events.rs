//! Payloads for the saga lifecycle events.
//!
//! Events are raised by [`LeadConversionSaga`](super::LeadConversionSaga) as it
//! moves through its states and are handed to the publisher by the
//! `PublishEvents` step or drained by the caller afterwards.

use serde::Serialize;
use uuid::Uuid;

use super::step::StepType;
use crate::state_machine::SagaState;

#[derive(Debug, Serialize)]
pub(crate) struct SagaStartedPayload {
    pub saga_id: Uuid,
    pub lead_id: Uuid,
    pub initiated_by: Uuid,
    pub idempotency_key: String,
    pub step_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct StepPayload<'a> {
    pub saga_id: Uuid,
    pub lead_id: Uuid,
    pub step_type: StepType,
    pub order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StateChangedPayload<'a> {
    pub saga_id: Uuid,
    pub lead_id: Uuid,
    pub state: SagaState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SagaCompletedPayload {
    pub saga_id: Uuid,
    pub lead_id: Uuid,
    pub opportunity_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_created: bool,
    pub conversion_time_ms: i64,
}
