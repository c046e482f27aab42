//! # Orchestration Engine
//!
//! In-process coordinator for the lead conversion saga.
//!
//! ## Core Components
//!
//! - **LeadConversionOrchestrator**: executes, compensates and resumes sagas
//! - **StepHandlerRegistry**: forward handler per step type
//! - **CompensationHandlerRegistry**: undo handler per step with side effects
//! - **RequestContext**: tenant, actor, cancellation token and deadline carried into every call
//!
//! The orchestrator never schedules work itself; stuck sagas are picked up by
//! [`crate::recovery::SagaRecoverySweeper`] or by the caller.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod orchestrator;
pub mod registry;

pub use context::{CancellationToken, RequestContext};
pub use errors::{SagaError, SagaResult, StepError, StepResult};
pub use handlers::{CompensationHandler, StepHandler, StepOutcome};
pub use orchestrator::LeadConversionOrchestrator;
pub use registry::{CompensationHandlerRegistry, SagaCollaborators, StepHandlerRegistry};
