use crate::catalog::CatalogRepository;
use crate::error::EngineError;
use crate::events::EventRepository;
use crate::messages::MessageRepository;
use crate::outbox::OutboxRepository;
use crate::progress::ProgressRepository;
use crate::promotions::PromotionRepository;

/// The durable local store: catalog mirror, progress, memberships, the
/// message cache, the outbox, and the event log.
pub trait Store {
    type Catalog<'a>: CatalogRepository
    where
        Self: 'a;
    type Progress<'a>: ProgressRepository
    where
        Self: 'a;
    type Promotions<'a>: PromotionRepository
    where
        Self: 'a;
    type Messages<'a>: MessageRepository
    where
        Self: 'a;
    type Outbox<'a>: OutboxRepository
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;

    fn catalog(&self) -> Self::Catalog<'_>;
    fn progress(&self) -> Self::Progress<'_>;
    fn promotions(&self) -> Self::Promotions<'_>;
    fn messages(&self) -> Self::Messages<'_>;
    fn outbox(&self) -> Self::Outbox<'_>;
    fn events(&self) -> Self::Events<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>;
}
