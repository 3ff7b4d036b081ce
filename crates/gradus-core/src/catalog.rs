use crate::error::ProgressionError;
use crate::types::{Formation, FormationId, LearnerId, Lesson, LessonId, Level, LevelId};

pub trait CatalogRepository {
    fn formation(&self, id: &FormationId) -> Result<Option<Formation>, ProgressionError>;
    fn upsert_formation(&self, formation: &Formation) -> Result<(), ProgressionError>;
    fn level(&self, id: &LevelId) -> Result<Option<Level>, ProgressionError>;
    /// Levels of a formation, ordered by `order_index` ascending.
    fn levels(&self, formation_id: &FormationId) -> Result<Vec<Level>, ProgressionError>;
    fn lesson(&self, id: &LessonId) -> Result<Option<Lesson>, ProgressionError>;
    /// Lessons of a level, ordered by `order_index` ascending.
    fn lessons(&self, level_id: &LevelId) -> Result<Vec<Lesson>, ProgressionError>;
    fn upsert_level(&self, level: &Level) -> Result<(), ProgressionError>;
    fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), ProgressionError>;
    fn is_teacher(
        &self,
        formation_id: &FormationId,
        learner_id: &LearnerId,
    ) -> Result<bool, ProgressionError>;
    fn add_teacher(
        &self,
        formation_id: &FormationId,
        learner_id: &LearnerId,
    ) -> Result<(), ProgressionError>;
}
