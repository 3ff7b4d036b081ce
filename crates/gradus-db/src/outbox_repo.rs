use crate::util::{decode_enum, decode_json, decode_ts, encode_enum, encode_json, encode_ts};
use gradus_core::error::OutboxError;
use gradus_core::outbox::OutboxRepository;
use gradus_core::types::enums::PendingState;
use gradus_core::types::{ChatScope, LocalMessageId, PendingMessage};
use rusqlite::Connection;
use std::str::FromStr;

pub struct OutboxRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> OutboxRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> OutboxError {
    OutboxError::InvalidInput {
        message: err.to_string(),
    }
}

const COLUMNS: &str = "local_id, seq, state, attempts, last_error, draft_json, created_at";

impl<'a> OutboxRepository for OutboxRepo<'a> {
    fn next_seq(&self, scope: &ChatScope) -> Result<i64, OutboxError> {
        let sql = "SELECT COALESCE(MAX(seq), 0) + 1 FROM outbox WHERE lesson_id = ?1 AND formation_id = ?2";
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let seq: i64 = stmt
            .query_row([scope.lesson_id.as_str(), scope.formation_id.as_str()], |row| {
                row.get(0)
            })
            .map_err(db_err)?;
        Ok(seq)
    }

    fn enqueue(&self, pending: &PendingMessage) -> Result<(), OutboxError> {
        let scope = pending.scope();
        let sql = "INSERT INTO outbox (local_id, lesson_id, formation_id, seq, state, attempts, last_error, draft_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        self.conn
            .execute(
                sql,
                (
                    pending.local_id.as_str(),
                    scope.lesson_id.as_str(),
                    scope.formation_id.as_str(),
                    pending.seq,
                    encode_enum(&pending.state).map_err(db_err)?,
                    pending.attempts,
                    pending.last_error.clone(),
                    encode_json(&pending.draft).map_err(db_err)?,
                    encode_ts(&pending.created_at),
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn get(&self, local_id: &LocalMessageId) -> Result<Option<PendingMessage>, OutboxError> {
        let sql = format!("SELECT {COLUMNS} FROM outbox WHERE local_id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt.query([local_id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_pending_row(row).map(Some)
    }

    fn for_scope(&self, scope: &ChatScope) -> Result<Vec<PendingMessage>, OutboxError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM outbox WHERE lesson_id = ?1 AND formation_id = ?2 ORDER BY seq ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query([scope.lesson_id.as_str(), scope.formation_id.as_str()])
            .map_err(db_err)?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            pending.push(map_pending_row(row)?);
        }
        Ok(pending)
    }

    fn queued(&self) -> Result<Vec<PendingMessage>, OutboxError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM outbox WHERE state = 'Queued' ORDER BY formation_id ASC, lesson_id ASC, seq ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt.query([]).map_err(db_err)?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            pending.push(map_pending_row(row)?);
        }
        Ok(pending)
    }

    fn set_state(
        &self,
        local_id: &LocalMessageId,
        state: PendingState,
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<(), OutboxError> {
        let sql = "UPDATE outbox SET state = ?2, attempts = ?3, last_error = ?4 WHERE local_id = ?1";
        let affected = self
            .conn
            .execute(
                sql,
                (
                    local_id.as_str(),
                    encode_enum(&state).map_err(db_err)?,
                    attempts,
                    last_error,
                ),
            )
            .map_err(db_err)?;
        if affected == 0 {
            return Err(OutboxError::NotFound);
        }
        Ok(())
    }

    fn remove(&self, local_id: &LocalMessageId) -> Result<(), OutboxError> {
        self.conn
            .execute("DELETE FROM outbox WHERE local_id = ?1", [local_id.as_str()])
            .map_err(db_err)?;
        Ok(())
    }

    fn requeue_replaying(&self) -> Result<u64, OutboxError> {
        let affected = self
            .conn
            .execute(
                "UPDATE outbox SET state = 'Queued' WHERE state = 'Replaying'",
                [],
            )
            .map_err(db_err)?;
        Ok(affected as u64)
    }
}

fn map_pending_row(row: &rusqlite::Row<'_>) -> Result<PendingMessage, OutboxError> {
    let local_id: String = row.get(0).map_err(db_err)?;
    let seq: i64 = row.get(1).map_err(db_err)?;
    let state: String = row.get(2).map_err(db_err)?;
    let attempts: u32 = row.get(3).map_err(db_err)?;
    let last_error: Option<String> = row.get(4).map_err(db_err)?;
    let draft_json: String = row.get(5).map_err(db_err)?;
    let created_at: String = row.get(6).map_err(db_err)?;

    Ok(PendingMessage {
        local_id: LocalMessageId::from_str(&local_id).map_err(db_err)?,
        seq,
        state: decode_enum(&state).map_err(db_err)?,
        attempts,
        last_error,
        draft: decode_json(&draft_json).map_err(db_err)?,
        created_at: decode_ts(&created_at).map_err(db_err)?,
    })
}
