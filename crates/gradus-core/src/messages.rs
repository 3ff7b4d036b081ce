use crate::error::MessageError;
use crate::types::{ChatScope, LearnerId, LocalMessageId, Message, MessageId};

pub trait MessageRepository {
    fn get(&self, id: &MessageId) -> Result<Option<Message>, MessageError>;
    /// All messages of a scope in chronological order. System and global
    /// messages for the scope are included; filtering is the caller's job.
    fn list_scope(&self, scope: &ChatScope) -> Result<Vec<Message>, MessageError>;
    /// Ids of messages in the scope authored by the given learner, for the
    /// reply-to-viewer visibility rule.
    fn authored_in_scope(
        &self,
        scope: &ChatScope,
        learner_id: &LearnerId,
    ) -> Result<Vec<MessageId>, MessageError>;
    /// First write wins: inserting a message whose `id` or `local_ref` is
    /// already stored leaves the existing row untouched, which is what makes
    /// replay idempotent.
    fn upsert(&self, message: &Message) -> Result<(), MessageError>;
    fn by_local_ref(&self, local_ref: &LocalMessageId) -> Result<Option<Message>, MessageError>;
}
