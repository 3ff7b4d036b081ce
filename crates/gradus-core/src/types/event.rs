use crate::progression::SelectionRule;
use crate::types::ids::{
    FormationId, LearnerId, LessonId, LevelId, LocalMessageId, PromotionId,
};
use crate::types::message::{Message, PendingMessage};
use crate::types::progress::ProgressRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    ProgressRecorded {
        record: ProgressRecord,
    },
    ProgressOverridden {
        record: ProgressRecord,
    },

    MessageReceived {
        message: Message,
    },
    MessageQueued {
        pending: PendingMessage,
    },
    MessageReplaying {
        local_id: LocalMessageId,
    },
    MessageAcknowledged {
        local_id: LocalMessageId,
        message: Message,
    },
    MessageFailed {
        local_id: LocalMessageId,
        reason: String,
    },
    MessageWithdrawn {
        local_id: LocalMessageId,
    },

    MembershipChanged {
        learner_id: LearnerId,
        promotion_id: PromotionId,
        formation_id: FormationId,
        active: bool,
    },

    ConnectivityChanged {
        online: bool,
    },

    /// Audited fallback branch of the active-lesson selection (never silent).
    ActiveLessonFallback {
        learner_id: LearnerId,
        level_id: LevelId,
        formation_id: FormationId,
        lesson_id: LessonId,
        rule: SelectionRule,
    },
}
