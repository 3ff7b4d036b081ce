use crate::types::enums::ProgressStatus;
use crate::types::ids::{FormationId, LearnerId, LessonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub formation_id: FormationId,
    pub status: ProgressStatus,
    pub exercise_done: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A learner's position within a formation, as a pair of order indexes.
/// Ordering is lexicographic: level first, then lesson within the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Standing {
    pub level_order: i64,
    pub lesson_order: i64,
}

impl Standing {
    /// The position assigned to a learner with no resolvable progression.
    pub const ZERO: Standing = Standing {
        level_order: 0,
        lesson_order: 0,
    };

    pub fn new(level_order: i64, lesson_order: i64) -> Self {
        Self {
            level_order,
            lesson_order,
        }
    }
}
