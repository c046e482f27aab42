#![allow(dead_code)]

use proptest::prelude::*;

use crm_sales_core::saga::{CustomerResolution, StepType};
use crm_sales_core::state_machine::{SagaState, SagaTransition};

/// Strategy for generating any saga state
pub fn saga_state_strategy() -> impl Strategy<Value = SagaState> {
    prop::sample::select(SagaState::ALL.to_vec())
}

/// Strategy for generating any saga transition event
pub fn saga_transition_strategy() -> impl Strategy<Value = SagaTransition> {
    prop::sample::select(SagaTransition::ALL.to_vec())
}

/// Strategy for generating sequences of transition events
pub fn transition_sequence_strategy() -> impl Strategy<Value = Vec<SagaTransition>> {
    prop::collection::vec(saga_transition_strategy(), 0..12)
}

pub fn customer_resolution_strategy() -> impl Strategy<Value = CustomerResolution> {
    prop_oneof![
        Just(CustomerResolution::CreateNew),
        Just(CustomerResolution::LookupExisting),
    ]
}

/// Strategy for generating any step type
pub fn step_type_strategy() -> impl Strategy<Value = StepType> {
    prop_oneof![
        Just(StepType::ValidateLead),
        customer_resolution_strategy().prop_map(StepType::ResolveCustomer),
        Just(StepType::CreateOpportunity),
        Just(StepType::MarkLeadConverted),
        Just(StepType::PublishEvents),
    ]
}
