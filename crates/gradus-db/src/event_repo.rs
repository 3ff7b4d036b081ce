use crate::util::{decode_enum, decode_json, decode_ts, encode_enum, encode_json, encode_ts};
use gradus_core::error::EngineError;
use gradus_core::events::EventRepository;
use gradus_events::types::EventRecord;
use rusqlite::Connection;
use ulid::Ulid;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> EngineError {
    EngineError::Internal {
        message: err.to_string(),
    }
}

impl<'a> EventRepository for EventRepo<'a> {
    /// Assigns the id and the next log sequence; the caller's values for both
    /// are ignored.
    fn append(&self, event: EventRecord) -> Result<EventRecord, EngineError> {
        let seq: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM events", [], |row| {
                row.get(0)
            })
            .map_err(db_err)?;
        let id = format!("evt_{}", Ulid::new());

        self.conn
            .execute(
                "INSERT INTO events (id, seq, at, correlation_id, source, body_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    id.clone(),
                    seq,
                    encode_ts(&event.at),
                    event.correlation_id.clone(),
                    encode_enum(&event.source).map_err(db_err)?,
                    encode_json(&event.body).map_err(db_err)?,
                ),
            )
            .map_err(db_err)?;

        Ok(EventRecord { id, seq, ..event })
    }

    fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, EngineError> {
        let after = after.unwrap_or(0);
        let limit = i64::from(limit.unwrap_or(u32::MAX));
        let mut stmt = self
            .conn
            .prepare("SELECT id, seq, at, correlation_id, source, body_json FROM events WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2")
            .map_err(db_err)?;
        let mut rows = stmt.query((after, limit)).map_err(db_err)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            events.push(map_event_row(row)?);
        }
        Ok(events)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<EventRecord, EngineError> {
    let id: String = row.get(0).map_err(db_err)?;
    let seq: i64 = row.get(1).map_err(db_err)?;
    let at: String = row.get(2).map_err(db_err)?;
    let correlation_id: Option<String> = row.get(3).map_err(db_err)?;
    let source: String = row.get(4).map_err(db_err)?;
    let body_json: String = row.get(5).map_err(db_err)?;

    Ok(EventRecord {
        id,
        seq,
        at: decode_ts(&at).map_err(db_err)?,
        correlation_id,
        source: decode_enum(&source).map_err(db_err)?,
        body: decode_json(&body_json).map_err(db_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gradus_events::types::EventSource;
    use serde_json::json;

    fn record(body: serde_json::Value) -> EventRecord {
        EventRecord {
            id: String::new(),
            seq: 0,
            at: Utc::now(),
            correlation_id: Some("req-1".to_string()),
            source: EventSource::System,
            body,
        }
    }

    #[test]
    fn append_assigns_monotonic_seq_and_id() {
        let conn = crate::schema::with_test_db().unwrap();
        let repo = EventRepo::new(&conn);

        let first = repo.append(record(json!({"kind": "a"}))).unwrap();
        let second = repo.append(record(json!({"kind": "b"}))).unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(first.id.starts_with("evt_"));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn list_pages_after_a_seq() {
        let conn = crate::schema::with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        for n in 0..3 {
            repo.append(record(json!({"n": n}))).unwrap();
        }

        let tail = repo.list(Some(1), None).unwrap();
        let seqs: Vec<i64> = tail.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3]);

        let limited = repo.list(None, Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
