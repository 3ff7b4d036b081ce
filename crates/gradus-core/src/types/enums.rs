use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    AwaitingReview,
    Completed,
}

/// Durable states of a locally queued message. `Drafted` and `Sent` are
/// transient online-path states and never hit the outbox table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PendingState {
    Queued,
    Replaying,
    Failed,
}

/// Per-message delivery state the application layer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeliveryState {
    Pending,
    Sent,
    Failed,
}

/// How the visibility filter treats a sender whose progression cannot be
/// resolved. FailOpen mirrors observed production behavior: an unknown sender
/// is placed at order zero and their messages are visible to the whole cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UnknownProgressionPolicy {
    #[default]
    FailOpen,
    FailClosed,
}
