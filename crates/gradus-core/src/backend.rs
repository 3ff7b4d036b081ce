use crate::error::BackendError;
use crate::types::{
    ChatScope, FormationId, LearnerId, LocalMessageId, Message, MessageDraft, ProgressRecord,
    PromotionMembership,
};
use std::future::Future;
use tokio::sync::{broadcast, watch};

/// Change events pushed by the remote collaborator for a subscribed scope.
#[derive(Debug, Clone)]
pub enum RemoteChange {
    MessageUpserted(Message),
    ProgressUpserted(ProgressRecord),
    MembershipChanged {
        membership: PromotionMembership,
        formation_id: FormationId,
    },
}

/// The remote storage collaborator, consumed through insert/query/subscribe
/// only. `insert_message` must be idempotent on `local_id`: a replayed
/// duplicate returns the canonical message already stored.
pub trait Backend {
    fn insert_message(
        &self,
        local_id: &LocalMessageId,
        draft: &MessageDraft,
    ) -> impl Future<Output = Result<Message, BackendError>> + Send;

    fn query_messages(
        &self,
        scope: &ChatScope,
    ) -> impl Future<Output = Result<Vec<Message>, BackendError>> + Send;

    fn query_progress(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> impl Future<Output = Result<Vec<ProgressRecord>, BackendError>> + Send;

    fn subscribe(&self, scope: &ChatScope) -> broadcast::Receiver<RemoteChange>;
}

/// The auth collaborator. Session management is external; the engine only
/// needs to know who is asking.
pub trait AuthProvider {
    fn current_learner_id(&self) -> LearnerId;
}

/// Shared online/offline flag. The sync coordinator watches it; the send path
/// polls it.
#[derive(Clone)]
pub struct Connectivity {
    sender: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn set_online(&self, online: bool) {
        self.sender.send_replace(online);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
