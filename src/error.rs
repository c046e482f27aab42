use std::fmt;

use crate::orchestration::SagaError;
use crate::ports::StoreError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Clone, PartialEq)]
pub enum CrmError {
    PersistenceError(String),
    StateTransitionError(String),
    SagaError(String),
    EventError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrmError::PersistenceError(msg) => write!(f, "Persistence error: {msg}"),
            CrmError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            CrmError::SagaError(msg) => write!(f, "Saga error: {msg}"),
            CrmError::EventError(msg) => write!(f, "Event error: {msg}"),
            CrmError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            CrmError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CrmError {}

impl From<StateMachineError> for CrmError {
    fn from(err: StateMachineError) -> Self {
        CrmError::StateTransitionError(err.to_string())
    }
}

impl From<StoreError> for CrmError {
    fn from(err: StoreError) -> Self {
        CrmError::PersistenceError(err.to_string())
    }
}

impl From<SagaError> for CrmError {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::InvalidTransition(inner) => inner.into(),
            SagaError::Persistence(inner) => inner.into(),
            other => CrmError::SagaError(other.to_string()),
        }
    }
}

impl From<crate::events::PublishError> for CrmError {
    fn from(err: crate::events::PublishError) -> Self {
        CrmError::EventError(err.to_string())
    }
}

impl From<::config::ConfigError> for CrmError {
    fn from(err: ::config::ConfigError) -> Self {
        CrmError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrmError>;
