//! SQLite persistence for the gradus engine: schema migrations, one
//! repository per aggregate, and the [`store::DbStore`] glue that implements
//! the core [`gradus_core::store::Store`] trait.

pub mod catalog_repo;
pub mod event_repo;
pub mod message_repo;
pub mod outbox_repo;
pub mod progress_repo;
pub mod promotion_repo;
pub mod schema;
pub mod store;
pub mod util;

pub use store::DbStore;
