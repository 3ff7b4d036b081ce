use crate::types::enums::{PendingState, ProgressStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("level has no lessons")]
    NoLessons,
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ProgressStatus,
        to: ProgressStatus,
    },
    #[error("lesson not found")]
    LessonNotFound,
    #[error("level not found")]
    LevelNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum CohortError {
    #[error("promotion not found")]
    PromotionNotFound,
    #[error("no active membership")]
    NoActiveMembership,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("pending message not found")]
    NotFound,
    #[error("message is already replaying")]
    AlreadyReplaying,
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: PendingState,
        to: PendingState,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("retry exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

/// Failures reported by the remote collaborator. `Unavailable` and `Timeout`
/// are transient and convert to queuing; `Conflict` is a duplicate replay and
/// resolves idempotently; the rest are permanent.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable")]
    Unavailable,
    #[error("attempt timed out")]
    Timeout,
    #[error("duplicate insert: {local_id}")]
    Conflict { local_id: String },
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
    #[error("validation failed: {message}")]
    Validation { message: String },
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Cohort(#[from] CohortError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Outbox(#[from] OutboxError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("internal error: {message}")]
    Internal { message: String },
}
