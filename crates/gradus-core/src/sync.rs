use crate::backend::{AuthProvider, Backend, RemoteChange};
use crate::cache::InvalidationEvent;
use crate::engine::{Engine, RequestContext};
use crate::error::{BackendError, EngineError, SyncError};
use crate::messages::MessageRepository;
use crate::outbox::{validate_pending_transition, OutboxRepository};
use crate::progress::ProgressRepository;
use crate::promotions::PromotionRepository;
use crate::store::Store;
use crate::types::enums::PendingState;
use crate::types::{ChatScope, EventBody, LearnerId, Message, PendingMessage};
use gradus_events::types::EventSource;

impl<S: Store, B: Backend, A: AuthProvider> Engine<S, B, A> {
    pub fn sync(&self) -> SyncApi<'_, S, B, A> {
        SyncApi { core: self }
    }
}

/// Replays the outbox against the backend and reconciles local state with
/// authoritative state. The only component besides the send path that touches
/// the durable queue.
pub struct SyncApi<'a, S: Store, B: Backend, A: AuthProvider> {
    core: &'a Engine<S, B, A>,
}

impl<'a, S: Store, B: Backend, A: AuthProvider> SyncApi<'a, S, B, A> {
    /// Startup entry point: demotes entries interrupted mid-replay back to
    /// `Queued`, then drains.
    pub async fn resume(&self, ctx: &RequestContext) -> Result<(), EngineError> {
        let demoted = self.core.store.outbox().requeue_replaying()?;
        if demoted > 0 {
            tracing::info!(demoted, "requeued interrupted replays");
        }
        self.drain(ctx).await
    }

    /// Drains the queue in FIFO order. Within one scope, replay order equals
    /// creation order.
    pub async fn drain(&self, ctx: &RequestContext) -> Result<(), EngineError> {
        let queued = self.core.store.outbox().queued()?;
        for pending in queued {
            self.replay_one(ctx, pending).await?;
        }
        Ok(())
    }

    async fn replay_one(
        &self,
        ctx: &RequestContext,
        pending: PendingMessage,
    ) -> Result<(), EngineError> {
        validate_pending_transition(pending.state, PendingState::Replaying)?;
        self.core.with_events(ctx, |store| {
            store.outbox().set_state(
                &pending.local_id,
                PendingState::Replaying,
                pending.attempts,
                None,
            )?;
            Ok((
                (),
                vec![EventBody::MessageReplaying {
                    local_id: pending.local_id.clone(),
                }],
            ))
        })?;

        let mut attempts = pending.attempts;
        loop {
            let attempt = tokio::time::timeout(
                self.core.config.attempt_timeout(),
                self.core.backend.insert_message(&pending.local_id, &pending.draft),
            )
            .await;
            let outcome = match attempt {
                Ok(inner) => inner,
                Err(_) => Err(BackendError::Timeout),
            };

            match outcome {
                Ok(message) => {
                    self.acknowledge(ctx, &pending, message)?;
                    return Ok(());
                }
                Err(BackendError::Conflict { .. }) => {
                    // Duplicate from an earlier replay; adopt the canonical
                    // message instead of inserting again.
                    match self.find_canonical(&pending).await? {
                        Some(message) => {
                            self.acknowledge(ctx, &pending, message)?;
                            return Ok(());
                        }
                        None => {
                            self.fail(
                                ctx,
                                &pending,
                                attempts,
                                "conflict without a canonical message",
                            )?;
                            return Ok(());
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    attempts += 1;
                    if attempts >= self.core.config.retry.max_attempts {
                        self.fail(
                            ctx,
                            &pending,
                            attempts,
                            &SyncError::RetryExhausted { attempts }.to_string(),
                        )?;
                        return Ok(());
                    }
                    self.core.store.outbox().set_state(
                        &pending.local_id,
                        PendingState::Replaying,
                        attempts,
                        Some(&err.to_string()),
                    )?;
                    tokio::time::sleep(self.core.config.retry.delay_for(attempts - 1)).await;
                }
                Err(err) => {
                    self.fail(ctx, &pending, attempts, &err.to_string())?;
                    return Ok(());
                }
            }
        }
    }

    fn acknowledge(
        &self,
        ctx: &RequestContext,
        pending: &PendingMessage,
        mut message: Message,
    ) -> Result<(), EngineError> {
        message.local_ref = Some(pending.local_id.clone());
        self.core.with_events(ctx, |store| {
            store.outbox().remove(&pending.local_id)?;
            store.messages().upsert(&message)?;
            Ok((
                (),
                vec![EventBody::MessageAcknowledged {
                    local_id: pending.local_id.clone(),
                    message: message.clone(),
                }],
            ))
        })?;
        self.core.cache.invalidate(&InvalidationEvent::MessageReceived {
            formation_id: message.formation_id.clone(),
        });
        Ok(())
    }

    fn fail(
        &self,
        ctx: &RequestContext,
        pending: &PendingMessage,
        attempts: u32,
        reason: &str,
    ) -> Result<(), EngineError> {
        tracing::warn!(local_id = %pending.local_id, attempts, reason, "message failed");
        self.core.with_events(ctx, |store| {
            store.outbox().set_state(
                &pending.local_id,
                PendingState::Failed,
                attempts,
                Some(reason),
            )?;
            Ok((
                (),
                vec![EventBody::MessageFailed {
                    local_id: pending.local_id.clone(),
                    reason: reason.to_string(),
                }],
            ))
        })
    }

    async fn find_canonical(
        &self,
        pending: &PendingMessage,
    ) -> Result<Option<Message>, EngineError> {
        if let Some(found) = self
            .core
            .store
            .messages()
            .by_local_ref(&pending.local_id)?
        {
            return Ok(Some(found));
        }
        let remote = self.core.backend.query_messages(&pending.scope()).await?;
        Ok(remote
            .into_iter()
            .find(|message| message.local_ref.as_ref() == Some(&pending.local_id)))
    }

    /// Pulls authoritative rows for a scope into the local mirror.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        scope: &ChatScope,
        learner_id: &LearnerId,
    ) -> Result<(), EngineError> {
        let messages = self.core.backend.query_messages(scope).await?;
        let records = self
            .core
            .backend
            .query_progress(learner_id, &scope.formation_id)
            .await?;
        self.core.with_events(ctx, |store| {
            for message in &messages {
                store.messages().upsert(message)?;
            }
            for record in &records {
                store.progress().upsert(record)?;
            }
            Ok(((), Vec::new()))
        })?;
        self.core.cache.invalidate(&InvalidationEvent::MessageReceived {
            formation_id: scope.formation_id.clone(),
        });
        self.core.cache.invalidate(&InvalidationEvent::ProgressRecorded {
            learner_id: learner_id.clone(),
            formation_id: scope.formation_id.clone(),
        });
        Ok(())
    }

    /// Applies one pushed change from the backend subscription.
    pub fn apply_change(
        &self,
        ctx: &RequestContext,
        change: RemoteChange,
    ) -> Result<(), EngineError> {
        match change {
            RemoteChange::MessageUpserted(message) => {
                let formation_id = message.formation_id.clone();
                self.core.with_events(ctx, |store| {
                    store.messages().upsert(&message)?;
                    Ok((
                        (),
                        vec![EventBody::MessageReceived {
                            message: message.clone(),
                        }],
                    ))
                })?;
                self.core
                    .cache
                    .invalidate(&InvalidationEvent::MessageReceived { formation_id });
            }
            RemoteChange::ProgressUpserted(record) => {
                let learner_id = record.learner_id.clone();
                let formation_id = record.formation_id.clone();
                self.core.with_events(ctx, |store| {
                    store.progress().upsert(&record)?;
                    Ok((
                        (),
                        vec![EventBody::ProgressRecorded {
                            record: record.clone(),
                        }],
                    ))
                })?;
                self.core.cache.invalidate(&InvalidationEvent::ProgressRecorded {
                    learner_id,
                    formation_id,
                });
            }
            RemoteChange::MembershipChanged {
                membership,
                formation_id,
            } => {
                self.core.with_events(ctx, |store| {
                    store.promotions().apply_membership(&membership)?;
                    Ok((
                        (),
                        vec![EventBody::MembershipChanged {
                            learner_id: membership.learner_id.clone(),
                            promotion_id: membership.promotion_id.clone(),
                            formation_id: formation_id.clone(),
                            active: membership.active,
                        }],
                    ))
                })?;
                self.core
                    .cache
                    .invalidate(&InvalidationEvent::MembershipChanged { formation_id });
            }
        }
        Ok(())
    }

    /// Watches the connectivity flag; every offline-to-online transition
    /// invalidates cached reads and drains the queue. A failed drain is
    /// logged and waits for the next transition; the watcher itself runs
    /// until the connectivity channel closes.
    pub async fn run(&self) -> Result<(), EngineError> {
        let ctx = RequestContext::new(EventSource::Sync, None);
        let mut receiver = self.core.connectivity.subscribe();
        let mut was_online = *receiver.borrow();
        while receiver.changed().await.is_ok() {
            let online = *receiver.borrow();
            self.core.announce(
                EventSource::System,
                &EventBody::ConnectivityChanged { online },
            );
            if online && !was_online {
                tracing::info!("connectivity regained, draining outbox");
                self.core
                    .cache
                    .invalidate(&InvalidationEvent::ConnectivityRegained);
                if let Err(err) = self.resume(&ctx).await {
                    tracing::error!(error = %err, "outbox drain failed");
                }
            }
            was_online = online;
        }
        Ok(())
    }
}
