use super::events::SagaTransition;
use super::states::SagaState;

/// Errors raised when a saga edge is not allowed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    #[error("Invalid saga transition: cannot {event} from {from}")]
    InvalidTransition {
        from: SagaState,
        event: SagaTransition,
    },

    #[error("Saga is already in terminal state {state}")]
    Terminal { state: SagaState },
}

impl StateMachineError {
    /// State the saga was in when the transition was refused
    pub fn from_state(&self) -> SagaState {
        match self {
            Self::InvalidTransition { from, .. } => *from,
            Self::Terminal { state } => *state,
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
