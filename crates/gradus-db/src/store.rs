use crate::catalog_repo::CatalogRepo;
use crate::event_repo::EventRepo;
use crate::message_repo::MessageRepo;
use crate::outbox_repo::OutboxRepo;
use crate::progress_repo::ProgressRepo;
use crate::promotion_repo::PromotionRepo;
use gradus_core::error::EngineError;
use gradus_core::store::Store;
use rusqlite::Connection;

/// SQLite-backed [`Store`]. One connection, WAL mode, repositories borrow it.
pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &str) -> Result<Self, EngineError> {
        let conn = crate::schema::open_and_migrate(path).map_err(|err| EngineError::Internal {
            message: err.to_string(),
        })?;
        tracing::debug!(path, "opened sqlite store");
        Ok(Self { conn })
    }

    #[doc(hidden)]
    pub fn in_memory() -> Result<Self, EngineError> {
        let conn = crate::schema::with_test_db().map_err(|err| EngineError::Internal {
            message: err.to_string(),
        })?;
        Ok(Self { conn })
    }
}

fn tx_err(err: rusqlite::Error) -> EngineError {
    EngineError::Internal {
        message: err.to_string(),
    }
}

impl Store for DbStore {
    type Catalog<'a> = CatalogRepo<'a>;
    type Progress<'a> = ProgressRepo<'a>;
    type Promotions<'a> = PromotionRepo<'a>;
    type Messages<'a> = MessageRepo<'a>;
    type Outbox<'a> = OutboxRepo<'a>;
    type Events<'a> = EventRepo<'a>;

    fn catalog(&self) -> CatalogRepo<'_> {
        CatalogRepo::new(&self.conn)
    }

    fn progress(&self) -> ProgressRepo<'_> {
        ProgressRepo::new(&self.conn)
    }

    fn promotions(&self) -> PromotionRepo<'_> {
        PromotionRepo::new(&self.conn)
    }

    fn messages(&self) -> MessageRepo<'_> {
        MessageRepo::new(&self.conn)
    }

    fn outbox(&self) -> OutboxRepo<'_> {
        OutboxRepo::new(&self.conn)
    }

    fn events(&self) -> EventRepo<'_> {
        EventRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(tx_err)?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT").map_err(tx_err)?;
                Ok(value)
            }
            Err(err) => {
                // Rollback failure loses the original error; keep the original.
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }
}
