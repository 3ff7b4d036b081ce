use crate::util::{decode_ts, encode_ts};
use gradus_core::catalog::CatalogRepository;
use gradus_core::error::ProgressionError;
use gradus_core::types::{Formation, FormationId, LearnerId, Lesson, LessonId, Level, LevelId};
use rusqlite::Connection;
use std::str::FromStr;

pub struct CatalogRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> CatalogRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> ProgressionError {
    ProgressionError::InvalidInput {
        message: err.to_string(),
    }
}

impl<'a> CatalogRepository for CatalogRepo<'a> {
    fn formation(&self, id: &FormationId) -> Result<Option<Formation>, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM formations WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_formation_row(row).map(Some)
    }

    fn upsert_formation(&self, formation: &Formation) -> Result<(), ProgressionError> {
        let sql = "INSERT INTO formations (id, name, created_at) VALUES (?1, ?2, ?3) ON CONFLICT(id) DO UPDATE SET name = ?2";
        self.conn
            .execute(
                sql,
                (
                    formation.id.as_str(),
                    formation.name.clone(),
                    encode_ts(&formation.created_at),
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn level(&self, id: &LevelId) -> Result<Option<Level>, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, formation_id, name, order_index FROM levels WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_level_row(row).map(Some)
    }

    fn levels(&self, formation_id: &FormationId) -> Result<Vec<Level>, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, formation_id, name, order_index FROM levels WHERE formation_id = ?1 ORDER BY order_index ASC")
            .map_err(db_err)?;
        let mut rows = stmt.query([formation_id.as_str()]).map_err(db_err)?;
        let mut levels = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            levels.push(map_level_row(row)?);
        }
        Ok(levels)
    }

    fn lesson(&self, id: &LessonId) -> Result<Option<Lesson>, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, level_id, formation_id, name, order_index, has_exercise FROM lessons WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_lesson_row(row).map(Some)
    }

    fn lessons(&self, level_id: &LevelId) -> Result<Vec<Lesson>, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, level_id, formation_id, name, order_index, has_exercise FROM lessons WHERE level_id = ?1 ORDER BY order_index ASC")
            .map_err(db_err)?;
        let mut rows = stmt.query([level_id.as_str()]).map_err(db_err)?;
        let mut lessons = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            lessons.push(map_lesson_row(row)?);
        }
        Ok(lessons)
    }

    fn upsert_level(&self, level: &Level) -> Result<(), ProgressionError> {
        let sql = "INSERT INTO levels (id, formation_id, name, order_index) VALUES (?1, ?2, ?3, ?4) ON CONFLICT(id) DO UPDATE SET formation_id = ?2, name = ?3, order_index = ?4";
        self.conn
            .execute(
                sql,
                (
                    level.id.as_str(),
                    level.formation_id.as_str(),
                    level.name.clone(),
                    level.order_index,
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), ProgressionError> {
        let sql = "INSERT INTO lessons (id, level_id, formation_id, name, order_index, has_exercise) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(id) DO UPDATE SET level_id = ?2, formation_id = ?3, name = ?4, order_index = ?5, has_exercise = ?6";
        self.conn
            .execute(
                sql,
                (
                    lesson.id.as_str(),
                    lesson.level_id.as_str(),
                    lesson.formation_id.as_str(),
                    lesson.name.clone(),
                    lesson.order_index,
                    lesson.has_exercise,
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn is_teacher(
        &self,
        formation_id: &FormationId,
        learner_id: &LearnerId,
    ) -> Result<bool, ProgressionError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM formation_teachers WHERE formation_id = ?1 AND learner_id = ?2")
            .map_err(db_err)?;
        let found = stmt
            .exists([formation_id.as_str(), learner_id.as_str()])
            .map_err(db_err)?;
        Ok(found)
    }

    fn add_teacher(
        &self,
        formation_id: &FormationId,
        learner_id: &LearnerId,
    ) -> Result<(), ProgressionError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO formation_teachers (formation_id, learner_id) VALUES (?1, ?2)",
                [formation_id.as_str(), learner_id.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

fn map_formation_row(row: &rusqlite::Row<'_>) -> Result<Formation, ProgressionError> {
    let id: String = row.get(0).map_err(db_err)?;
    let name: String = row.get(1).map_err(db_err)?;
    let created_at: String = row.get(2).map_err(db_err)?;
    Ok(Formation {
        id: FormationId::from_str(&id).map_err(db_err)?,
        name,
        created_at: decode_ts(&created_at).map_err(db_err)?,
    })
}

fn map_level_row(row: &rusqlite::Row<'_>) -> Result<Level, ProgressionError> {
    let id: String = row.get(0).map_err(db_err)?;
    let formation_id: String = row.get(1).map_err(db_err)?;
    let name: String = row.get(2).map_err(db_err)?;
    let order_index: i64 = row.get(3).map_err(db_err)?;
    Ok(Level {
        id: LevelId::from_str(&id).map_err(db_err)?,
        formation_id: FormationId::from_str(&formation_id).map_err(db_err)?,
        name,
        order_index,
    })
}

fn map_lesson_row(row: &rusqlite::Row<'_>) -> Result<Lesson, ProgressionError> {
    let id: String = row.get(0).map_err(db_err)?;
    let level_id: String = row.get(1).map_err(db_err)?;
    let formation_id: String = row.get(2).map_err(db_err)?;
    let name: String = row.get(3).map_err(db_err)?;
    let order_index: i64 = row.get(4).map_err(db_err)?;
    let has_exercise: bool = row.get(5).map_err(db_err)?;
    Ok(Lesson {
        id: LessonId::from_str(&id).map_err(db_err)?,
        level_id: LevelId::from_str(&level_id).map_err(db_err)?,
        formation_id: FormationId::from_str(&formation_id).map_err(db_err)?,
        name,
        order_index,
        has_exercise,
    })
}
