//! # Lead Conversion Saga
//!
//! The saga aggregate, its steps and their typed outputs. Orchestration of
//! the steps lives in [`crate::orchestration`].

mod events;
pub mod idempotency;
pub mod lead_conversion;
pub mod step;

pub use idempotency::generate_idempotency_key;
pub use lead_conversion::{LeadConversionRequest, LeadConversionResult, LeadConversionSaga};
pub use step::{CustomerResolution, SagaStep, StepOutput, StepType};
