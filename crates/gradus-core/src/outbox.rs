use crate::error::OutboxError;
use crate::types::enums::PendingState;
use crate::types::{ChatScope, LocalMessageId, PendingMessage};

/// Durable local queue. Mutated only by the send path (enqueue) and the sync
/// coordinator (state changes, remove); payloads are never edited in place.
pub trait OutboxRepository {
    /// Next FIFO sequence number within the scope.
    fn next_seq(&self, scope: &ChatScope) -> Result<i64, OutboxError>;
    fn enqueue(&self, pending: &PendingMessage) -> Result<(), OutboxError>;
    fn get(&self, local_id: &LocalMessageId) -> Result<Option<PendingMessage>, OutboxError>;
    /// Pending entries for one scope, FIFO by seq (for optimistic rendering).
    fn for_scope(&self, scope: &ChatScope) -> Result<Vec<PendingMessage>, OutboxError>;
    /// All queued entries across scopes, FIFO by (formation, lesson, seq).
    fn queued(&self) -> Result<Vec<PendingMessage>, OutboxError>;
    fn set_state(
        &self,
        local_id: &LocalMessageId,
        state: PendingState,
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<(), OutboxError>;
    fn remove(&self, local_id: &LocalMessageId) -> Result<(), OutboxError>;
    /// Restart recovery: demote entries stuck in `Replaying` back to `Queued`.
    fn requeue_replaying(&self) -> Result<u64, OutboxError>;
}

/// Allowed persisted-state transitions for a pending message.
pub fn validate_pending_transition(
    from: PendingState,
    to: PendingState,
) -> Result<(), OutboxError> {
    use PendingState::{Failed, Queued, Replaying};

    let valid = match (from, to) {
        (Queued, Replaying) => true,
        // Restart recovery demotes a stuck replay back to the queue.
        (Replaying, Queued) => true,
        (Replaying, Failed) => true,
        // Manual resend only.
        (Failed, Queued) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(OutboxError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_can_start_replaying() {
        validate_pending_transition(PendingState::Queued, PendingState::Replaying).unwrap();
    }

    #[test]
    fn failed_requires_manual_resend() {
        validate_pending_transition(PendingState::Failed, PendingState::Queued).unwrap();
        let err = validate_pending_transition(PendingState::Failed, PendingState::Replaying)
            .unwrap_err();
        assert!(matches!(err, OutboxError::InvalidTransition { .. }));
    }

    #[test]
    fn queued_cannot_fail_without_replay() {
        let err =
            validate_pending_transition(PendingState::Queued, PendingState::Failed).unwrap_err();
        assert!(matches!(err, OutboxError::InvalidTransition { .. }));
    }
}
