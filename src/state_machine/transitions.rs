use super::errors::{StateMachineError, StateMachineResult};
use super::events::SagaTransition;
use super::states::SagaState;

/// Determine the target state for an event, or refuse the edge.
///
/// This is the only place the legal edge set lives:
///
/// ```text
/// Started      --Start-------------> Running
/// Running      --StartCompensation-> Compensating
/// Running      --Complete----------> Completed
/// Compensating --Compensated-------> Compensated
/// Compensating --Fail--------------> Failed
/// ```
pub fn determine_target_state(
    current_state: SagaState,
    event: SagaTransition,
) -> StateMachineResult<SagaState> {
    if current_state.is_terminal() {
        return Err(StateMachineError::Terminal {
            state: current_state,
        });
    }

    let target = match (current_state, event) {
        (SagaState::Started, SagaTransition::Start) => SagaState::Running,
        (SagaState::Running, SagaTransition::StartCompensation) => SagaState::Compensating,
        (SagaState::Running, SagaTransition::Complete) => SagaState::Completed,
        (SagaState::Compensating, SagaTransition::Compensated) => SagaState::Compensated,
        (SagaState::Compensating, SagaTransition::Fail) => SagaState::Failed,

        (from, event) => return Err(StateMachineError::InvalidTransition { from, event }),
    };

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_edges() {
        assert_eq!(
            determine_target_state(SagaState::Started, SagaTransition::Start).unwrap(),
            SagaState::Running
        );
        assert_eq!(
            determine_target_state(SagaState::Running, SagaTransition::StartCompensation)
                .unwrap(),
            SagaState::Compensating
        );
        assert_eq!(
            determine_target_state(SagaState::Running, SagaTransition::Complete).unwrap(),
            SagaState::Completed
        );
        assert_eq!(
            determine_target_state(SagaState::Compensating, SagaTransition::Compensated).unwrap(),
            SagaState::Compensated
        );
        assert_eq!(
            determine_target_state(SagaState::Compensating, SagaTransition::Fail).unwrap(),
            SagaState::Failed
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot complete before starting
        assert!(matches!(
            determine_target_state(SagaState::Started, SagaTransition::Complete),
            Err(StateMachineError::InvalidTransition { .. })
        ));

        // Cannot fail outside compensation
        assert!(determine_target_state(SagaState::Running, SagaTransition::Fail).is_err());

        // Cannot restart a running saga
        assert!(determine_target_state(SagaState::Running, SagaTransition::Start).is_err());
    }

    #[test]
    fn test_terminal_states_refuse_everything() {
        for state in [SagaState::Completed, SagaState::Compensated, SagaState::Failed] {
            for event in SagaTransition::ALL {
                let err = determine_target_state(state, event).unwrap_err();
                assert_eq!(err, StateMachineError::Terminal { state });
                assert_eq!(err.from_state(), state);
            }
        }
    }
}
