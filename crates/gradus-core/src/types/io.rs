use crate::types::enums::ProgressStatus;
use crate::types::ids::{FormationId, LearnerId, LessonId, LevelId, MessageId, PromotionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageInput {
    pub content: String,
    pub level_id: Option<LevelId>,
    pub promotion_id: Option<PromotionId>,
    pub receiver_id: Option<LearnerId>,
    pub reply_to: Option<MessageId>,
    pub is_exercise_submission: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProgressInput {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub formation_id: FormationId,
    pub status: ProgressStatus,
    pub exercise_done: bool,
}
