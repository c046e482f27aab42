use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::events::{SagaCompletedPayload, SagaStartedPayload, StateChangedPayload, StepPayload};
use super::step::{CustomerResolution, SagaStep, StepOutput, StepType};
use crate::constants::{aggregates, events};
use crate::domain::Money;
use crate::events::DomainEvent;
use crate::state_machine::{
    determine_target_state, SagaState, SagaTransition, StateMachineResult, StepStatus,
};

/// Immutable input of a conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadConversionRequest {
    pub pipeline_id: Uuid,
    /// Existing customer to link when `create_new_customer` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<Uuid>,
    pub create_new_customer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
}

impl LeadConversionRequest {
    /// Convert into `pipeline_id`, creating a customer from the lead's company
    pub fn create_customer(pipeline_id: Uuid) -> Self {
        Self {
            pipeline_id,
            customer_id: None,
            create_new_customer: true,
            owner_id: None,
            owner_name: None,
            description: None,
            expected_close_date: None,
            amount: None,
            probability: None,
        }
    }

    /// Convert into `pipeline_id`, linking an existing customer
    pub fn existing_customer(pipeline_id: Uuid, customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            create_new_customer: false,
            ..Self::create_customer(pipeline_id)
        }
    }

    pub fn with_owner(mut self, owner_id: Uuid, owner_name: Option<String>) -> Self {
        self.owner_id = Some(owner_id);
        self.owner_name = owner_name;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn customer_resolution(&self) -> CustomerResolution {
        if self.create_new_customer {
            CustomerResolution::CreateNew
        } else {
            CustomerResolution::LookupExisting
        }
    }
}

/// Outcome of a completed conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadConversionResult {
    pub lead_id: Uuid,
    pub opportunity_id: Uuid,
    pub opportunity_code: String,
    pub customer_id: Option<Uuid>,
    pub customer_code: Option<String>,
    pub customer_created: bool,
    pub contact_id: Option<Uuid>,
    pub converted_at: DateTime<Utc>,
    pub converted_by: Uuid,
    pub conversion_time_ms: i64,
}

/// Saga aggregate coordinating the conversion of one lead.
///
/// The step list is fixed at construction. State only changes through the
/// transition table in [`crate::state_machine`]; step progress only changes
/// through the `*_step` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadConversionSaga {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub idempotency_key: String,
    pub initiated_by: Uuid,
    pub request: LeadConversionRequest,
    state: SagaState,
    steps: Vec<SagaStep>,
    customer_id: Option<Uuid>,
    customer_created: bool,
    opportunity_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    result: Option<LeadConversionResult>,
    failure_reason: Option<String>,
    failed_step_type: Option<StepType>,
    compensation_error: Option<String>,
    /// Optimistic concurrency version, bumped by the saga store on every update
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl LeadConversionSaga {
    pub fn new(
        tenant_id: Uuid,
        lead_id: Uuid,
        idempotency_key: impl Into<String>,
        initiated_by: Uuid,
        request: LeadConversionRequest,
    ) -> Self {
        let steps = StepType::pipeline(request.customer_resolution())
            .into_iter()
            .zip(1u32..)
            .map(|(step_type, order)| SagaStep::new(step_type, order))
            .collect();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            tenant_id,
            lead_id,
            idempotency_key: idempotency_key.into(),
            initiated_by,
            request,
            state: SagaState::Started,
            steps,
            customer_id: None,
            customer_created: false,
            opportunity_id: None,
            contact_id: None,
            result: None,
            failure_reason: None,
            failed_step_type: None,
            compensation_error: None,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            events: Vec::new(),
        }
    }

    // ===== State transitions =====

    fn transition(&mut self, event: SagaTransition) -> StateMachineResult<SagaState> {
        let target = determine_target_state(self.state, event)?;
        self.state = target;
        self.updated_at = Utc::now();
        Ok(target)
    }

    /// `Started -> Running`
    pub fn start(&mut self) -> StateMachineResult<()> {
        self.transition(SagaTransition::Start)?;
        let payload = SagaStartedPayload {
            saga_id: self.id,
            lead_id: self.lead_id,
            initiated_by: self.initiated_by,
            idempotency_key: self.idempotency_key.clone(),
            step_count: self.steps.len(),
        };
        self.raise(events::SAGA_STARTED, payload);
        Ok(())
    }

    /// `Running -> Compensating`, recording the triggering failure
    pub fn start_compensation(
        &mut self,
        error: impl fmt::Display,
        failed_step: StepType,
    ) -> StateMachineResult<()> {
        self.begin_compensation(error, Some(failed_step))
    }

    /// `Running -> Compensating` when the request was stopped between steps.
    ///
    /// No step is blamed; the pending step keeps its status.
    pub fn interrupt(&mut self, error: impl fmt::Display) -> StateMachineResult<()> {
        self.begin_compensation(error, None)
    }

    fn begin_compensation(
        &mut self,
        error: impl fmt::Display,
        failed_step: Option<StepType>,
    ) -> StateMachineResult<()> {
        self.transition(SagaTransition::StartCompensation)?;
        self.failure_reason = Some(error.to_string());
        self.failed_step_type = failed_step;
        self.raise_state_changed(events::SAGA_COMPENSATING);
        Ok(())
    }

    /// `Running -> Completed`
    pub fn complete(&mut self, result: LeadConversionResult) -> StateMachineResult<()> {
        self.transition(SagaTransition::Complete)?;
        self.completed_at = Some(result.converted_at);
        let payload = SagaCompletedPayload {
            saga_id: self.id,
            lead_id: self.lead_id,
            opportunity_id: result.opportunity_id,
            customer_id: result.customer_id,
            customer_created: result.customer_created,
            conversion_time_ms: result.conversion_time_ms,
        };
        self.result = Some(result);
        self.raise(events::SAGA_COMPLETED, payload);
        Ok(())
    }

    /// `Compensating -> Compensated`
    pub fn mark_compensated(&mut self) -> StateMachineResult<()> {
        self.transition(SagaTransition::Compensated)?;
        self.completed_at = Some(self.updated_at);
        self.raise_state_changed(events::SAGA_COMPENSATED);
        Ok(())
    }

    /// `Compensating -> Failed`, recording the compensation error
    pub fn fail(&mut self, error: impl fmt::Display, step_type: StepType) -> StateMachineResult<()> {
        self.transition(SagaTransition::Fail)?;
        self.compensation_error = Some(format!("{step_type}: {error}"));
        self.completed_at = Some(self.updated_at);
        self.raise_state_changed(events::SAGA_FAILED);
        Ok(())
    }

    // ===== Step progress =====

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&SagaStep> {
        self.steps.get(index)
    }

    pub fn get_step(&self, step_type: StepType) -> Option<&SagaStep> {
        self.steps.iter().find(|step| step.step_type == step_type)
    }

    /// Output recorded by a completed step of the given type
    pub fn output_of(&self, step_type: StepType) -> Option<&StepOutput> {
        self.get_step(step_type)
            .filter(|step| step.status == StepStatus::Completed)
            .and_then(|step| step.output.as_ref())
    }

    /// Index of the first step that still has to run
    pub fn current_step_index(&self) -> Option<usize> {
        self.steps.iter().position(|step| !step.status.is_settled())
    }

    pub fn current_step(&self) -> Option<&SagaStep> {
        self.current_step_index().map(|index| &self.steps[index])
    }

    pub fn has_more_steps(&self) -> bool {
        self.current_step_index().is_some()
    }

    pub fn start_step(&mut self, index: usize) {
        if let Some(step) = self.steps.get_mut(index) {
            step.start();
            self.updated_at = Utc::now();
        }
    }

    /// Mark a step completed and fold its output into the saga-level results
    pub fn complete_step(&mut self, index: usize, output: StepOutput) {
        if index >= self.steps.len() {
            return;
        }
        match &output {
            StepOutput::CustomerCreated { customer_id, .. } => {
                self.set_customer_id(*customer_id, true)
            }
            StepOutput::CustomerResolved { customer_id, .. } => {
                self.set_customer_id(*customer_id, false)
            }
            StepOutput::OpportunityCreated { opportunity_id, .. } => {
                self.set_opportunity_id(*opportunity_id)
            }
            StepOutput::EventsPublished { published, .. } => {
                let published = (*published).min(self.events.len());
                self.events.drain(..published);
            }
            StepOutput::LeadValidated { .. } | StepOutput::LeadConverted { .. } => {}
        }

        let step = &mut self.steps[index];
        step.complete(output);
        let (step_type, order) = (step.step_type, step.order);
        self.updated_at = Utc::now();
        self.raise_step(events::SAGA_STEP_COMPLETED, step_type, order, None, None);
    }

    pub fn fail_step(&mut self, index: usize, error: impl fmt::Display) {
        let Some(step) = self.steps.get_mut(index) else {
            return;
        };
        step.fail(error);
        let (step_type, order, message) = (step.step_type, step.order, step.error.clone());
        self.updated_at = Utc::now();
        self.raise_step(events::SAGA_STEP_FAILED, step_type, order, message.as_deref(), None);
    }

    pub fn compensate_step(&mut self, index: usize, note: Option<String>) {
        let Some(step) = self.steps.get_mut(index) else {
            return;
        };
        step.compensate(note);
        let (step_type, order, note) = (step.step_type, step.order, step.compensation_note.clone());
        self.updated_at = Utc::now();
        self.raise_step(events::SAGA_STEP_COMPENSATED, step_type, order, None, note.as_deref());
    }

    /// Completed steps, last executed first
    pub fn completed_steps_in_reverse(&self) -> Vec<usize> {
        (0..self.steps.len())
            .rev()
            .filter(|&index| self.steps[index].status == StepStatus::Completed)
            .collect()
    }

    pub fn steps_completed(&self) -> usize {
        self.count_steps(StepStatus::Completed)
    }

    pub fn steps_failed(&self) -> usize {
        self.count_steps(StepStatus::Failed)
    }

    pub fn steps_compensated(&self) -> usize {
        self.count_steps(StepStatus::Compensated)
    }

    fn count_steps(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }

    // ===== Accumulated results =====

    pub fn set_customer_id(&mut self, customer_id: Uuid, created: bool) {
        self.customer_id = Some(customer_id);
        self.customer_created = created;
        self.updated_at = Utc::now();
    }

    pub fn set_opportunity_id(&mut self, opportunity_id: Uuid) {
        self.opportunity_id = Some(opportunity_id);
        self.updated_at = Utc::now();
    }

    pub fn set_contact_id(&mut self, contact_id: Uuid) {
        self.contact_id = Some(contact_id);
        self.updated_at = Utc::now();
    }

    pub fn customer_id(&self) -> Option<Uuid> {
        self.customer_id
    }

    pub fn customer_created(&self) -> bool {
        self.customer_created
    }

    pub fn opportunity_id(&self) -> Option<Uuid> {
        self.opportunity_id
    }

    pub fn contact_id(&self) -> Option<Uuid> {
        self.contact_id
    }

    pub fn result(&self) -> Option<&LeadConversionResult> {
        self.result.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn failed_step_type(&self) -> Option<StepType> {
        self.failed_step_type
    }

    pub fn compensation_error(&self) -> Option<&str> {
        self.compensation_error.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Milliseconds between saga creation and `at`
    pub fn elapsed_ms(&self, at: DateTime<Utc>) -> i64 {
        (at - self.created_at).num_milliseconds()
    }

    /// Build the result payload from the recorded step outputs
    pub fn build_result(&self, converted_at: DateTime<Utc>) -> Option<LeadConversionResult> {
        let (opportunity_id, opportunity_code) =
            match self.output_of(StepType::CreateOpportunity)? {
                StepOutput::OpportunityCreated {
                    opportunity_id,
                    opportunity_code,
                    ..
                } => (*opportunity_id, opportunity_code.clone()),
                _ => return None,
            };
        let customer_code = match self.output_of(StepType::CREATE_CUSTOMER) {
            Some(StepOutput::CustomerCreated { customer_code, .. }) => Some(customer_code.clone()),
            _ => None,
        };

        Some(LeadConversionResult {
            lead_id: self.lead_id,
            opportunity_id,
            opportunity_code,
            customer_id: self.customer_id,
            customer_code,
            customer_created: self.customer_created,
            contact_id: self.contact_id,
            converted_at,
            converted_by: self.initiated_by,
            conversion_time_ms: self.elapsed_ms(converted_at),
        })
    }

    /// One-line diagnostic description
    pub fn summary(&self) -> String {
        format!(
            "Saga[{}] Lead[{}] State[{}] Steps[{}/{} completed, {} failed]",
            short_id(self.id),
            short_id(self.lead_id),
            self.state,
            self.steps_completed(),
            self.steps.len(),
            self.steps_failed()
        )
    }

    // ===== Domain events =====

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Queue events raised by collaborating aggregates for publishing
    pub fn record_events(&mut self, events: impl IntoIterator<Item = DomainEvent>) {
        self.events.extend(events);
    }

    /// Drain the events raised since the last call
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise(&mut self, event_type: &str, payload: impl Serialize) {
        let event = DomainEvent::new(
            event_type,
            aggregates::SAGA,
            self.id,
            self.tenant_id,
            self.version,
            payload,
        );
        self.events.push(event);
    }

    fn raise_state_changed(&mut self, event_type: &str) {
        let reason = self
            .compensation_error
            .clone()
            .or_else(|| self.failure_reason.clone());
        let payload = StateChangedPayload {
            saga_id: self.id,
            lead_id: self.lead_id,
            state: self.state,
            failed_step: self.failed_step_type,
            reason: reason.as_deref(),
        };
        self.raise(event_type, payload);
    }

    fn raise_step(
        &mut self,
        event_type: &str,
        step_type: StepType,
        order: u32,
        error: Option<&str>,
        note: Option<&str>,
    ) {
        let payload = StepPayload {
            saga_id: self.id,
            lead_id: self.lead_id,
            step_type,
            order,
            error,
            note,
        };
        self.raise(event_type, payload);
    }
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LeadStatus;
    use crate::state_machine::StateMachineError;

    fn saga(create_new_customer: bool) -> LeadConversionSaga {
        let pipeline_id = Uuid::new_v4();
        let request = if create_new_customer {
            LeadConversionRequest::create_customer(pipeline_id)
        } else {
            LeadConversionRequest::existing_customer(pipeline_id, Uuid::new_v4())
        };
        LeadConversionSaga::new(Uuid::new_v4(), Uuid::new_v4(), "key", Uuid::new_v4(), request)
    }

    fn validated() -> StepOutput {
        StepOutput::LeadValidated {
            lead_status: LeadStatus::Qualified,
            pipeline_id: Uuid::new_v4(),
            pipeline_name: "Default".to_string(),
            company_name: "Acme".to_string(),
            contact_email: "ada@acme.test".to_string(),
        }
    }

    #[test]
    fn test_step_list_follows_customer_branch() {
        let create = saga(true);
        let types: Vec<_> = create.steps().iter().map(|s| s.step_type).collect();
        assert_eq!(types, StepType::pipeline(CustomerResolution::CreateNew).to_vec());
        assert!(create.get_step(StepType::LOOKUP_CUSTOMER).is_none());

        let lookup = saga(false);
        assert!(lookup.get_step(StepType::LOOKUP_CUSTOMER).is_some());
        assert!(lookup.get_step(StepType::CREATE_CUSTOMER).is_none());

        let orders: Vec<_> = lookup.steps().iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut saga = saga(true);
        assert_eq!(saga.state(), SagaState::Started);

        saga.start().unwrap();
        assert_eq!(saga.state(), SagaState::Running);
        assert_eq!(saga.pending_events()[0].event_type, events::SAGA_STARTED);
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let mut saga = saga(true);

        let err = saga.mark_compensated().unwrap_err();
        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                from: SagaState::Started,
                event: SagaTransition::Compensated,
            }
        );
        assert_eq!(saga.state(), SagaState::Started);

        saga.start().unwrap();
        assert!(saga.fail("boom", StepType::CreateOpportunity).is_err());
        assert_eq!(saga.state(), SagaState::Running);
        assert!(saga.compensation_error().is_none());
    }

    #[test]
    fn test_compensation_records_failure() {
        let mut saga = saga(true);
        saga.start().unwrap();
        saga.start_compensation("repository down", StepType::CreateOpportunity)
            .unwrap();

        assert_eq!(saga.state(), SagaState::Compensating);
        assert_eq!(saga.failure_reason(), Some("repository down"));
        assert_eq!(saga.failed_step_type(), Some(StepType::CreateOpportunity));

        saga.fail("delete failed", StepType::CreateOpportunity).unwrap();
        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.completed_at().is_some());
        assert!(saga.start().is_err());
    }

    #[test]
    fn test_interrupt_blames_no_step() {
        let mut saga = saga(true);
        assert!(saga.interrupt("cancelled").is_err());

        saga.start().unwrap();
        saga.interrupt("Operation was cancelled").unwrap();

        assert_eq!(saga.state(), SagaState::Compensating);
        assert_eq!(saga.failure_reason(), Some("Operation was cancelled"));
        assert!(saga.failed_step_type().is_none());
        assert!(saga.steps().iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_current_step_skips_settled_steps() {
        let mut saga = saga(false);
        saga.start().unwrap();
        assert_eq!(saga.current_step_index(), Some(0));

        saga.start_step(0);
        saga.complete_step(0, validated());
        assert_eq!(saga.current_step_index(), Some(1));

        let customer_id = Uuid::new_v4();
        saga.start_step(1);
        saga.complete_step(
            1,
            StepOutput::CustomerResolved {
                customer_id,
                customer_name: None,
            },
        );
        assert_eq!(saga.customer_id(), Some(customer_id));
        assert!(!saga.customer_created());
        assert_eq!(saga.current_step().unwrap().step_type, StepType::CreateOpportunity);
        assert_eq!(saga.completed_steps_in_reverse(), vec![1, 0]);
    }

    #[test]
    fn test_events_published_drains_queue() {
        let mut saga = saga(true);
        saga.start().unwrap();
        saga.start_step(0);
        saga.complete_step(0, validated());
        let queued = saga.pending_events().len();
        assert_eq!(queued, 2);

        saga.complete_step(
            4,
            StepOutput::EventsPublished {
                published: queued,
                pending: 0,
            },
        );
        // only the publish step's own completion event remains
        assert_eq!(saga.pending_events().len(), 1);
        assert_eq!(saga.pending_events()[0].event_type, events::SAGA_STEP_COMPLETED);
    }

    #[test]
    fn test_build_result_requires_opportunity() {
        let mut saga = saga(true);
        assert!(saga.build_result(Utc::now()).is_none());

        let opportunity_id = Uuid::new_v4();
        saga.complete_step(
            1,
            StepOutput::CustomerCreated {
                customer_id: Uuid::new_v4(),
                customer_code: "CUS-0001".to_string(),
                customer_name: "Acme".to_string(),
            },
        );
        saga.complete_step(
            2,
            StepOutput::OpportunityCreated {
                opportunity_id,
                opportunity_code: "OPP-0001".to_string(),
                opportunity_name: "Acme - Ada".to_string(),
            },
        );

        let result = saga.build_result(Utc::now()).unwrap();
        assert_eq!(result.opportunity_id, opportunity_id);
        assert_eq!(result.customer_code.as_deref(), Some("CUS-0001"));
        assert!(result.customer_created);
        assert!(result.conversion_time_ms >= 0);
    }

    #[test]
    fn test_summary() {
        let mut saga = saga(true);
        saga.start().unwrap();
        saga.start_step(0);
        saga.complete_step(0, validated());

        let summary = saga.summary();
        assert!(summary.contains("State[running]"));
        assert!(summary.contains("Steps[1/5 completed, 0 failed]"));
    }

    #[test]
    fn test_events_are_not_persisted() {
        let mut saga = saga(true);
        saga.start().unwrap();

        let json = serde_json::to_string(&saga).unwrap();
        let restored: LeadConversionSaga = serde_json::from_str(&json).unwrap();
        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.state(), SagaState::Running);
        assert_eq!(restored.steps().len(), 5);
    }
}
