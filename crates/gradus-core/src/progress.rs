use crate::error::ProgressionError;
use crate::types::{FormationId, LearnerId, LessonId, LevelId, ProgressRecord};

pub trait ProgressRepository {
    fn get(
        &self,
        learner_id: &LearnerId,
        lesson_id: &LessonId,
    ) -> Result<Option<ProgressRecord>, ProgressionError>;
    fn for_level(
        &self,
        learner_id: &LearnerId,
        level_id: &LevelId,
    ) -> Result<Vec<ProgressRecord>, ProgressionError>;
    fn for_formation(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> Result<Vec<ProgressRecord>, ProgressionError>;
    /// Insert-or-update keyed by (learner, lesson). Records are never deleted.
    fn upsert(&self, record: &ProgressRecord) -> Result<(), ProgressionError>;
}
