use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that can trigger saga state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaTransition {
    /// Begin executing forward steps
    Start,
    /// A forward step failed; begin undoing completed steps
    StartCompensation,
    /// All forward steps succeeded
    Complete,
    /// Every compensation handler succeeded
    Compensated,
    /// A compensation handler failed
    Fail,
}

impl SagaTransition {
    /// All transition events
    pub const ALL: [SagaTransition; 5] = [
        Self::Start,
        Self::StartCompensation,
        Self::Complete,
        Self::Compensated,
        Self::Fail,
    ];

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartCompensation => "start_compensation",
            Self::Complete => "complete",
            Self::Compensated => "compensated",
            Self::Fail => "fail",
        }
    }

    /// Check if this event leads into a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Compensated | Self::Fail)
    }
}

impl fmt::Display for SagaTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}
