use crate::error::ProgressionError;
use crate::types::enums::ProgressStatus;

/// Normal-flow progress transitions only move forward. Teacher overrides
/// bypass this check entirely.
pub fn validate_progress_transition(
    from: ProgressStatus,
    to: ProgressStatus,
) -> Result<(), ProgressionError> {
    use ProgressStatus::{AwaitingReview, Completed, InProgress, NotStarted};

    if from == to {
        return Ok(());
    }

    let valid = match (from, to) {
        (NotStarted, InProgress) => true,
        (InProgress, AwaitingReview) => true,
        // Lessons without an exercise complete straight from in-progress.
        (InProgress, Completed) => true,
        (AwaitingReview, Completed) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ProgressionError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_allowed() {
        use ProgressStatus::{AwaitingReview, Completed, InProgress, NotStarted};
        validate_progress_transition(NotStarted, InProgress).unwrap();
        validate_progress_transition(InProgress, AwaitingReview).unwrap();
        validate_progress_transition(InProgress, Completed).unwrap();
        validate_progress_transition(AwaitingReview, Completed).unwrap();
    }

    #[test]
    fn backward_transitions_rejected() {
        use ProgressStatus::{Completed, InProgress, NotStarted};
        let err = validate_progress_transition(Completed, InProgress).unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidTransition { .. }));
        let err = validate_progress_transition(InProgress, NotStarted).unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidTransition { .. }));
    }

    #[test]
    fn same_status_is_a_no_op() {
        validate_progress_transition(ProgressStatus::InProgress, ProgressStatus::InProgress)
            .unwrap();
    }
}
