use crate::types::enums::{DeliveryState, PendingState};
use crate::types::ids::{
    FormationId, LearnerId, LessonId, LevelId, LocalMessageId, MessageId, PromotionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The (lesson, formation) pair a chat stream and its outbox are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatScope {
    pub lesson_id: LessonId,
    pub formation_id: FormationId,
}

impl ChatScope {
    pub fn new(lesson_id: LessonId, formation_id: FormationId) -> Self {
        Self {
            lesson_id,
            formation_id,
        }
    }
}

/// A message acknowledged by the backend. Immutable once stored; `local_ref`
/// links it back to the optimistic entry it replaced, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub local_ref: Option<LocalMessageId>,
    pub lesson_id: LessonId,
    pub level_id: Option<LevelId>,
    pub formation_id: FormationId,
    pub promotion_id: Option<PromotionId>,
    pub sender_id: LearnerId,
    pub receiver_id: Option<LearnerId>,
    pub content: String,
    pub is_system: bool,
    pub is_exercise_submission: bool,
    pub reply_to: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.promotion_id.is_some()
    }

    pub fn is_private(&self) -> bool {
        self.receiver_id.is_some()
    }
}

/// The full payload needed to reconstruct a remote insert during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub lesson_id: LessonId,
    pub level_id: Option<LevelId>,
    pub formation_id: FormationId,
    pub promotion_id: Option<PromotionId>,
    pub sender_id: LearnerId,
    pub receiver_id: Option<LearnerId>,
    pub content: String,
    pub is_system: bool,
    pub is_exercise_submission: bool,
    pub reply_to: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

impl MessageDraft {
    pub fn scope(&self) -> ChatScope {
        ChatScope::new(self.lesson_id.clone(), self.formation_id.clone())
    }
}

/// A message waiting in the outbox. Lives until acknowledged (replaced by the
/// canonical `Message`) or until it permanently fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub local_id: LocalMessageId,
    pub seq: i64,
    pub state: PendingState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub draft: MessageDraft,
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn scope(&self) -> ChatScope {
        self.draft.scope()
    }

    pub fn delivery_state(&self) -> DeliveryState {
        match self.state {
            PendingState::Queued | PendingState::Replaying => DeliveryState::Pending,
            PendingState::Failed => DeliveryState::Failed,
        }
    }
}

/// What a send returns: either the backend acknowledged immediately, or the
/// message was queued and the caller gets the optimistic pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outgoing {
    Delivered(Message),
    Pending(PendingMessage),
}
