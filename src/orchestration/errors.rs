use uuid::Uuid;

use crate::domain::{DomainError, LeadStatus};
use crate::events::PublishError;
use crate::ports::{RepositoryError, ServiceError, StoreError};
use crate::saga::StepType;
use crate::state_machine::{SagaState, StateMachineError};

/// Failure of a single forward or compensation step
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Lead {lead_id} not found")]
    LeadNotFound { lead_id: Uuid },

    #[error("Lead {lead_id} cannot be converted from status {status}")]
    LeadNotConvertible { lead_id: Uuid, status: LeadStatus },

    #[error("Pipeline {pipeline_id} not found")]
    PipelineNotFound { pipeline_id: Uuid },

    #[error("Pipeline {pipeline_id} is not active")]
    PipelineInactive { pipeline_id: Uuid },

    #[error("Customer {customer_id} not found")]
    CustomerNotFound { customer_id: Uuid },

    #[error("No customer id was given for a lookup conversion")]
    MissingCustomerId,

    #[error("No customer service is configured")]
    CustomerServiceUnavailable,

    #[error("Step {step} requires {missing} from an earlier step")]
    MissingPrerequisite {
        step: StepType,
        missing: &'static str,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Step timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Failure reason recorded on a saga reloaded mid-compensation
    #[error("{0}")]
    Recorded(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl StepError {
    /// Check if the caller stopped the operation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type StepResult<T> = Result<T, StepError>;

/// Errors returned by the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error(transparent)]
    InvalidTransition(#[from] StateMachineError),

    #[error("Saga {saga_id} is already {state}")]
    AlreadyTerminal { saga_id: Uuid, state: SagaState },

    #[error("Saga {saga_id} is not compensating (state: {state})")]
    NotCompensating { saga_id: Uuid, state: SagaState },

    /// A step failed and every completed side effect was undone
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: StepType,
        #[source]
        source: StepError,
    },

    /// The request was cancelled or ran out of time before `next_step` started;
    /// every completed side effect was undone
    #[error("Saga stopped before step '{next_step}' started: {source}")]
    Interrupted {
        next_step: StepType,
        #[source]
        source: StepError,
    },

    /// A step failed and undoing it failed too; the saga needs manual review
    #[error(
        "Step '{failed_step}' failed ({original}) and compensation of '{compensation_step}' failed: {compensation}"
    )]
    CompensationFailed {
        failed_step: StepType,
        original: StepError,
        compensation_step: StepType,
        #[source]
        compensation: StepError,
    },

    #[error("Saga checkpoint could not be saved: {0}")]
    Persistence(#[from] StoreError),

    #[error("Saga {saga_id} not found for tenant {tenant_id}")]
    NotFound { tenant_id: Uuid, saga_id: Uuid },

    /// The saga settled but its trailing events never reached the publisher
    #[error("Saga {saga_id} settled but {count} event(s) were not published: {source}")]
    EventsNotPublished {
        saga_id: Uuid,
        count: usize,
        #[source]
        source: PublishError,
    },

    #[error("Saga {saga_id} has no recorded output for step '{step}'")]
    MissingStepOutput { saga_id: Uuid, step: StepType },
}

impl SagaError {
    /// The conversion failed but no side effects were left behind
    pub fn is_compensated_failure(&self) -> bool {
        matches!(self, Self::StepFailed { .. } | Self::Interrupted { .. })
    }

    pub fn requires_manual_review(&self) -> bool {
        matches!(self, Self::CompensationFailed { .. })
    }

    /// The step failure that triggered compensation, if any
    pub fn original_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } | Self::Interrupted { source, .. } => Some(source),
            Self::CompensationFailed { original, .. } => Some(original),
            _ => None,
        }
    }
}

pub type SagaResult<T> = Result<T, SagaError>;
