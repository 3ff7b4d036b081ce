use crate::util::{decode_ts, encode_ts};
use gradus_core::error::MessageError;
use gradus_core::messages::MessageRepository;
use gradus_core::types::{
    ChatScope, FormationId, LearnerId, LessonId, LevelId, LocalMessageId, Message, MessageId,
    PromotionId,
};
use rusqlite::Connection;
use std::str::FromStr;

pub struct MessageRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> MessageRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> MessageError {
    MessageError::InvalidInput {
        message: err.to_string(),
    }
}

const COLUMNS: &str = "id, local_ref, lesson_id, level_id, formation_id, promotion_id, sender_id, receiver_id, content, is_system, is_exercise_submission, reply_to, created_at";

impl<'a> MessageRepository for MessageRepo<'a> {
    fn get(&self, id: &MessageId) -> Result<Option<Message>, MessageError> {
        let sql = format!("SELECT {COLUMNS} FROM messages WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_message_row(row).map(Some)
    }

    fn list_scope(&self, scope: &ChatScope) -> Result<Vec<Message>, MessageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages WHERE lesson_id = ?1 AND formation_id = ?2 ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt
            .query([scope.lesson_id.as_str(), scope.formation_id.as_str()])
            .map_err(db_err)?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            messages.push(map_message_row(row)?);
        }
        Ok(messages)
    }

    fn authored_in_scope(
        &self,
        scope: &ChatScope,
        learner_id: &LearnerId,
    ) -> Result<Vec<MessageId>, MessageError> {
        let sql = "SELECT id FROM messages WHERE lesson_id = ?1 AND formation_id = ?2 AND sender_id = ?3";
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let mut rows = stmt
            .query([
                scope.lesson_id.as_str(),
                scope.formation_id.as_str(),
                learner_id.as_str(),
            ])
            .map_err(db_err)?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            let id: String = row.get(0).map_err(db_err)?;
            ids.push(MessageId::from_str(&id).map_err(db_err)?);
        }
        Ok(ids)
    }

    fn upsert(&self, message: &Message) -> Result<(), MessageError> {
        // OR IGNORE covers both keys: a replayed id and a duplicate local_ref
        // each leave the first stored row untouched.
        let sql = "INSERT OR IGNORE INTO messages (id, local_ref, lesson_id, level_id, formation_id, promotion_id, sender_id, receiver_id, content, is_system, is_exercise_submission, reply_to, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";
        self.conn
            .execute(
                sql,
                (
                    message.id.as_str(),
                    message.local_ref.as_ref().map(|id| id.as_str()),
                    message.lesson_id.as_str(),
                    message.level_id.as_ref().map(|id| id.as_str()),
                    message.formation_id.as_str(),
                    message.promotion_id.as_ref().map(|id| id.as_str()),
                    message.sender_id.as_str(),
                    message.receiver_id.as_ref().map(|id| id.as_str()),
                    message.content.clone(),
                    message.is_system,
                    message.is_exercise_submission,
                    message.reply_to.as_ref().map(|id| id.as_str()),
                    encode_ts(&message.created_at),
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn by_local_ref(&self, local_ref: &LocalMessageId) -> Result<Option<Message>, MessageError> {
        let sql = format!("SELECT {COLUMNS} FROM messages WHERE local_ref = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let mut rows = stmt.query([local_ref.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_message_row(row).map(Some)
    }
}

fn map_message_row(row: &rusqlite::Row<'_>) -> Result<Message, MessageError> {
    let id: String = row.get(0).map_err(db_err)?;
    let local_ref: Option<String> = row.get(1).map_err(db_err)?;
    let lesson_id: String = row.get(2).map_err(db_err)?;
    let level_id: Option<String> = row.get(3).map_err(db_err)?;
    let formation_id: String = row.get(4).map_err(db_err)?;
    let promotion_id: Option<String> = row.get(5).map_err(db_err)?;
    let sender_id: String = row.get(6).map_err(db_err)?;
    let receiver_id: Option<String> = row.get(7).map_err(db_err)?;
    let content: String = row.get(8).map_err(db_err)?;
    let is_system: bool = row.get(9).map_err(db_err)?;
    let is_exercise_submission: bool = row.get(10).map_err(db_err)?;
    let reply_to: Option<String> = row.get(11).map_err(db_err)?;
    let created_at: String = row.get(12).map_err(db_err)?;

    Ok(Message {
        id: MessageId::from_str(&id).map_err(db_err)?,
        local_ref: local_ref
            .map(|value| LocalMessageId::from_str(&value))
            .transpose()
            .map_err(db_err)?,
        lesson_id: LessonId::from_str(&lesson_id).map_err(db_err)?,
        level_id: level_id
            .map(|value| LevelId::from_str(&value))
            .transpose()
            .map_err(db_err)?,
        formation_id: FormationId::from_str(&formation_id).map_err(db_err)?,
        promotion_id: promotion_id
            .map(|value| PromotionId::from_str(&value))
            .transpose()
            .map_err(db_err)?,
        sender_id: LearnerId::from_str(&sender_id).map_err(db_err)?,
        receiver_id: receiver_id
            .map(|value| LearnerId::from_str(&value))
            .transpose()
            .map_err(db_err)?,
        content,
        is_system,
        is_exercise_submission,
        reply_to: reply_to
            .map(|value| MessageId::from_str(&value))
            .transpose()
            .map_err(db_err)?,
        created_at: decode_ts(&created_at).map_err(db_err)?,
    })
}
