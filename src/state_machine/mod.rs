// State machine module for the lead conversion saga
//
// Saga-level states and the per-step statuses, plus the transition table that
// decides which edges are legal. The saga aggregate owns the mutation; this
// module only answers "may this edge be taken".

pub mod errors;
pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::SagaTransition;
pub use states::{SagaState, StepStatus};
pub use transitions::determine_target_state;
