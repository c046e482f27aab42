use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a lead conversion saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    /// Saga has been created but no step has run
    #[default]
    Started,
    /// Saga is executing forward steps
    Running,
    /// A step failed and completed side effects are being undone
    Compensating,
    /// Every step completed successfully
    Completed,
    /// Compensation finished; no leftover side effects the coordinator could undo
    Compensated,
    /// Compensation itself failed; needs operator attention
    Failed,
}

impl SagaState {
    /// All states in declaration order
    pub const ALL: [SagaState; 6] = [
        Self::Started,
        Self::Running,
        Self::Compensating,
        Self::Completed,
        Self::Compensated,
        Self::Failed,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Compensated | Self::Failed)
    }

    /// Check if work may still be in flight for a saga in this state
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Running | Self::Compensating)
    }

    /// Check if this state needs an operator to look at it
    pub fn requires_manual_review(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Compensating => write!(f, "compensating"),
            Self::Completed => write!(f, "completed"),
            Self::Compensated => write!(f, "compensated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SagaState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "running" => Ok(Self::Running),
            "compensating" => Ok(Self::Compensating),
            "completed" => Ok(Self::Completed),
            "compensated" => Ok(Self::Compensated),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid saga state: {s}")),
        }
    }
}

/// Execution status of a single saga step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not run yet
    #[default]
    Pending,
    /// Step handler is executing (or the process died while it was)
    Running,
    /// Step finished successfully
    Completed,
    /// Step handler returned an error
    Failed,
    /// Step was deliberately not executed
    Skipped,
    /// Step's side effect has been undone
    Compensated,
}

impl StepStatus {
    /// Steps in these states are never executed again
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Check if the step is currently executing
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Compensated => write!(f, "compensated"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "compensated" => Ok(Self::Compensated),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}
