pub mod catalog;
pub mod enums;
pub mod event;
pub mod ids;
pub mod io;
pub mod message;
pub mod progress;
pub mod promotion;

pub use catalog::{Formation, Lesson, Level};
pub use enums::{DeliveryState, PendingState, ProgressStatus, UnknownProgressionPolicy};
pub use event::EventBody;
pub use ids::{
    FormationId, IdError, LearnerId, LessonId, LevelId, LocalMessageId, MessageId, PromotionId,
};
pub use io::{RecordProgressInput, SendMessageInput};
pub use message::{ChatScope, Message, MessageDraft, Outgoing, PendingMessage};
pub use progress::{ProgressRecord, Standing};
pub use promotion::{Member, Promotion, PromotionMembership};
