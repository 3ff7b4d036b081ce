pub mod backend;
pub mod cache;
pub mod catalog;
pub mod cohort;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod messages;
pub mod outbox;
pub mod progress;
pub mod progression;
pub mod promotions;
pub mod store;
pub mod sync;
pub mod validation;
pub mod visibility;

pub mod types;

pub use crate::engine::{Engine, RequestContext};
pub use crate::error::EngineError;
pub use crate::store::Store;
