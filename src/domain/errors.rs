use uuid::Uuid;

use super::lead::LeadStatus;

/// Business rule violations raised by the sales aggregates
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Lead is already converted")]
    LeadAlreadyConverted,

    #[error("Lead must be qualified before conversion (current status: {status})")]
    LeadNotQualified { status: LeadStatus },

    #[error("Lead is not converted")]
    LeadNotConverted,

    #[error("Lead cannot move from {from} to {to}")]
    InvalidLeadTransition { from: LeadStatus, to: LeadStatus },

    #[error("Pipeline {pipeline_id} has no active stages")]
    PipelineHasNoStages { pipeline_id: Uuid },

    #[error("Invalid opportunity: {0}")]
    InvalidOpportunity(String),

    #[error("Probability must be between 0 and 100, got {0}")]
    InvalidProbability(u8),

    #[error("Currency mismatch: {expected} vs {actual}")]
    CurrencyMismatch { expected: String, actual: String },
}

pub type DomainResult<T> = Result<T, DomainError>;
