//! # Sales Core Constants
//!
//! Event names and fixed values shared by the conversion saga, the event
//! publisher and the use-case layer.

// Re-export state types for convenience
pub use crate::state_machine::{SagaState, StepStatus};

/// Domain event names raised by the lead conversion saga and its collaborators
pub mod events {
    // Saga lifecycle events
    pub const SAGA_STARTED: &str = "saga.lead_conversion.started";
    pub const SAGA_STEP_COMPLETED: &str = "saga.lead_conversion.step_completed";
    pub const SAGA_STEP_FAILED: &str = "saga.lead_conversion.step_failed";
    pub const SAGA_COMPENSATING: &str = "saga.lead_conversion.compensating";
    pub const SAGA_STEP_COMPENSATED: &str = "saga.lead_conversion.step_compensated";
    pub const SAGA_COMPENSATED: &str = "saga.lead_conversion.compensated";
    pub const SAGA_COMPLETED: &str = "saga.lead_conversion.completed";
    pub const SAGA_FAILED: &str = "saga.lead_conversion.failed";

    // Lead events
    pub const LEAD_CONVERTED: &str = "lead.converted";

    // Opportunity events
    pub const OPPORTUNITY_CREATED: &str = "opportunity.created";
}

/// Aggregate type names used in event envelopes
pub mod aggregates {
    pub const SAGA: &str = "saga";
    pub const LEAD: &str = "lead";
    pub const OPPORTUNITY: &str = "opportunity";
}

/// Prefix of every lead conversion idempotency key
pub const IDEMPOTENCY_KEY_PREFIX: &str = "lead_conversion";

/// Default width of the idempotency time bucket (five minutes)
pub const DEFAULT_IDEMPOTENCY_WINDOW_SECS: u64 = 300;

/// Note written on a `CreateCustomer` step when the customer could not be removed
pub const CUSTOMER_MANUAL_CLEANUP_NOTE: &str = "customer deletion requires manual cleanup";

/// Customer type and source used when creating a customer from a lead
pub const CONVERTED_CUSTOMER_TYPE: &str = "business";
pub const CONVERTED_CUSTOMER_SOURCE: &str = "lead_conversion";
