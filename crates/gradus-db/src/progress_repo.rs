use crate::util::{decode_enum, decode_ts, encode_enum, encode_ts};
use gradus_core::error::ProgressionError;
use gradus_core::progress::ProgressRepository;
use gradus_core::types::{FormationId, LearnerId, LessonId, LevelId, ProgressRecord};
use rusqlite::Connection;
use std::str::FromStr;

pub struct ProgressRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ProgressRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> ProgressionError {
    ProgressionError::InvalidInput {
        message: err.to_string(),
    }
}

const COLUMNS: &str =
    "learner_id, lesson_id, formation_id, status, exercise_done, completed_at, updated_at";

impl<'a> ProgressRepository for ProgressRepo<'a> {
    fn get(
        &self,
        learner_id: &LearnerId,
        lesson_id: &LessonId,
    ) -> Result<Option<ProgressRecord>, ProgressionError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM progress_records WHERE learner_id = ?1 AND lesson_id = ?2"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query([learner_id.as_str(), lesson_id.as_str()])
            .map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_record_row(row).map(Some)
    }

    fn for_level(
        &self,
        learner_id: &LearnerId,
        level_id: &LevelId,
    ) -> Result<Vec<ProgressRecord>, ProgressionError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM progress_records WHERE learner_id = ?1 AND lesson_id IN (SELECT id FROM lessons WHERE level_id = ?2)"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query([learner_id.as_str(), level_id.as_str()])
            .map_err(db_err)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            records.push(map_record_row(row)?);
        }
        Ok(records)
    }

    fn for_formation(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> Result<Vec<ProgressRecord>, ProgressionError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM progress_records WHERE learner_id = ?1 AND formation_id = ?2"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query([learner_id.as_str(), formation_id.as_str()])
            .map_err(db_err)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            records.push(map_record_row(row)?);
        }
        Ok(records)
    }

    fn upsert(&self, record: &ProgressRecord) -> Result<(), ProgressionError> {
        let sql = "INSERT INTO progress_records (learner_id, lesson_id, formation_id, status, exercise_done, completed_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON CONFLICT(learner_id, lesson_id) DO UPDATE SET status = ?4, exercise_done = ?5, completed_at = ?6, updated_at = ?7";
        let params = (
            record.learner_id.as_str(),
            record.lesson_id.as_str(),
            record.formation_id.as_str(),
            encode_enum(&record.status).map_err(db_err)?,
            record.exercise_done,
            record.completed_at.map(|value| encode_ts(&value)),
            encode_ts(&record.updated_at),
        );
        self.conn.execute(sql, params).map_err(db_err)?;
        Ok(())
    }
}

fn map_record_row(row: &rusqlite::Row<'_>) -> Result<ProgressRecord, ProgressionError> {
    let learner_id: String = row.get(0).map_err(db_err)?;
    let lesson_id: String = row.get(1).map_err(db_err)?;
    let formation_id: String = row.get(2).map_err(db_err)?;
    let status: String = row.get(3).map_err(db_err)?;
    let exercise_done: bool = row.get(4).map_err(db_err)?;
    let completed_at: Option<String> = row.get(5).map_err(db_err)?;
    let updated_at: String = row.get(6).map_err(db_err)?;

    Ok(ProgressRecord {
        learner_id: LearnerId::from_str(&learner_id).map_err(db_err)?,
        lesson_id: LessonId::from_str(&lesson_id).map_err(db_err)?,
        formation_id: FormationId::from_str(&formation_id).map_err(db_err)?,
        status: decode_enum(&status).map_err(db_err)?,
        exercise_done,
        completed_at: completed_at
            .map(|value| decode_ts(&value))
            .transpose()
            .map_err(db_err)?,
        updated_at: decode_ts(&updated_at).map_err(db_err)?,
    })
}
