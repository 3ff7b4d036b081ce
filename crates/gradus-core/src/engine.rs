use crate::backend::{AuthProvider, Backend, Connectivity};
use crate::cache::{CacheKey, CacheValue, InvalidationEvent, ReadCache};
use crate::cohort;
use crate::config::EngineConfig;
use crate::error::{
    CohortError, EngineError, MessageError, OutboxError, ProgressionError,
};
use crate::events::EventRepository;
use crate::messages::MessageRepository;
use crate::outbox::{validate_pending_transition, OutboxRepository};
use crate::progress::ProgressRepository;
use crate::progression::{formation_standing, select_active_lesson, ActiveLesson, SelectionRule};
use crate::promotions::PromotionRepository;
use crate::store::Store;
use crate::catalog::CatalogRepository;
use crate::types::enums::{PendingState, ProgressStatus};
use crate::types::{
    ChatScope, EventBody, FormationId, LearnerId, LessonId, LevelId, LocalMessageId, Member,
    Message, MessageDraft, Outgoing, PendingMessage, ProgressRecord, PromotionId,
    RecordProgressInput, SendMessageInput, Standing,
};
use crate::validation::validate_progress_transition;
use crate::visibility::{filter_messages, StreamContext, ViewerContext};
use chrono::Utc;
use gradus_events::bus::EventBus;
use gradus_events::types::{EventRecord, EventSource};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub source: EventSource,
    pub correlation_id: Option<String>,
}

impl RequestContext {
    pub fn new(source: EventSource, correlation_id: Option<String>) -> Self {
        Self {
            source,
            correlation_id,
        }
    }
}

pub struct Engine<S: Store, B: Backend, A: AuthProvider> {
    pub(crate) store: S,
    pub(crate) backend: B,
    pub(crate) auth: A,
    pub(crate) bus: EventBus,
    pub(crate) connectivity: Connectivity,
    pub(crate) cache: ReadCache,
    pub(crate) config: EngineConfig,
}

impl<S: Store, B: Backend, A: AuthProvider> Engine<S, B, A> {
    pub fn new(
        store: S,
        backend: B,
        auth: A,
        bus: EventBus,
        connectivity: Connectivity,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            auth,
            bus,
            connectivity,
            cache: ReadCache::new(),
            config,
        }
    }

    pub fn lessons(&self) -> LessonsApi<'_, S, B, A> {
        LessonsApi { core: self }
    }

    pub fn chat(&self) -> ChatApi<'_, S, B, A> {
        ChatApi { core: self }
    }

    pub fn cohort(&self) -> CohortApi<'_, S, B, A> {
        CohortApi { core: self }
    }

    pub fn progress(&self) -> ProgressApi<'_, S, B, A> {
        ProgressApi { core: self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn with_events<T, F>(
        &self,
        ctx: &RequestContext,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: FnOnce(&S) -> Result<(T, Vec<EventBody>), EngineError>,
    {
        let (value, records) = self.store.with_tx(|store| {
            let (value, bodies) = f(store)?;
            let mut records = Vec::new();
            for body in bodies {
                let record = build_event_record(ctx, &body)?;
                let record = store.events().append(record)?;
                records.push(record);
            }
            Ok((value, records))
        })?;
        for record in records {
            let _ = self.bus.publish(record);
        }
        Ok(value)
    }

    /// Bus-only event for read paths; nothing is persisted.
    pub(crate) fn announce(&self, source: EventSource, body: &EventBody) {
        let Ok(record) = build_event_record(&RequestContext::new(source, None), body) else {
            return;
        };
        let _ = self.bus.publish(record);
    }
}

fn build_event_record(ctx: &RequestContext, body: &EventBody) -> Result<EventRecord, EngineError> {
    let body = serde_json::to_value(body).map_err(|err| EngineError::Internal {
        message: err.to_string(),
    })?;
    Ok(EventRecord {
        id: String::new(),
        seq: 0,
        at: Utc::now(),
        correlation_id: ctx.correlation_id.clone(),
        source: ctx.source,
        body,
    })
}

pub struct LessonsApi<'a, S: Store, B: Backend, A: AuthProvider> {
    core: &'a Engine<S, B, A>,
}

impl<'a, S: Store, B: Backend, A: AuthProvider> LessonsApi<'a, S, B, A> {
    /// The lesson the learner is currently working in within a level; also the
    /// lesson a cohort discussion for that level is bound to. Progress lookup
    /// failures resolve to the level's first lesson through an audited
    /// fallback; an empty level is a terminal error, not a panic.
    pub fn active(
        &self,
        learner_id: &LearnerId,
        level_id: &LevelId,
        formation_id: &FormationId,
    ) -> Result<ActiveLesson, EngineError> {
        let key = CacheKey::ActiveLesson {
            learner_id: learner_id.clone(),
            level_id: level_id.clone(),
            formation_id: formation_id.clone(),
        };
        if let Some(CacheValue::ActiveLesson(hit)) = self.core.cache.get(&key) {
            return Ok(hit);
        }

        let lessons = self.core.store.catalog().lessons(level_id)?;
        if lessons.is_empty() {
            return Err(ProgressionError::NoLessons.into());
        }

        let progress: HashMap<LessonId, ProgressRecord> =
            match self.core.store.progress().for_level(learner_id, level_id) {
                Ok(records) => records
                    .into_iter()
                    .map(|record| (record.lesson_id.clone(), record))
                    .collect(),
                Err(err) => {
                    // Lookup failure resolves straight through the audited
                    // fallback branch; the result is not cached.
                    tracing::warn!(
                        learner = %learner_id,
                        level = %level_id,
                        error = %err,
                        "progress lookup failed, selecting first lesson"
                    );
                    let fallback = ActiveLesson {
                        lesson_id: lessons[0].id.clone(),
                        rule: SelectionRule::FirstLesson,
                    };
                    self.core.announce(
                        EventSource::System,
                        &EventBody::ActiveLessonFallback {
                            learner_id: learner_id.clone(),
                            level_id: level_id.clone(),
                            formation_id: formation_id.clone(),
                            lesson_id: fallback.lesson_id.clone(),
                            rule: fallback.rule,
                        },
                    );
                    return Ok(fallback);
                }
            };

        let active = select_active_lesson(&lessons, &progress)?;
        if active.rule == SelectionRule::FirstLesson {
            tracing::info!(
                learner = %learner_id,
                level = %level_id,
                lesson = %active.lesson_id,
                "active lesson resolved by first-lesson fallback"
            );
            self.core.announce(
                EventSource::System,
                &EventBody::ActiveLessonFallback {
                    learner_id: learner_id.clone(),
                    level_id: level_id.clone(),
                    formation_id: formation_id.clone(),
                    lesson_id: active.lesson_id.clone(),
                    rule: active.rule,
                },
            );
        }

        self.core
            .cache
            .put(key, CacheValue::ActiveLesson(active.clone()));
        Ok(active)
    }
}

pub struct ProgressApi<'a, S: Store, B: Backend, A: AuthProvider> {
    core: &'a Engine<S, B, A>,
}

impl<'a, S: Store, B: Backend, A: AuthProvider> ProgressApi<'a, S, B, A> {
    /// Normal-flow progress mutation; only forward transitions are accepted.
    pub fn record(
        &self,
        ctx: &RequestContext,
        input: RecordProgressInput,
    ) -> Result<ProgressRecord, EngineError> {
        let record = self.core.with_events(ctx, |store| {
            store
                .catalog()
                .lesson(&input.lesson_id)?
                .ok_or(ProgressionError::LessonNotFound)?;
            let current = store.progress().get(&input.learner_id, &input.lesson_id)?;
            let from = current
                .as_ref()
                .map_or(ProgressStatus::NotStarted, |record| record.status);
            validate_progress_transition(from, input.status)?;
            let record = build_record(&input);
            store.progress().upsert(&record)?;
            Ok((
                record.clone(),
                vec![EventBody::ProgressRecorded {
                    record: record.clone(),
                }],
            ))
        })?;
        self.core.cache.invalidate(&InvalidationEvent::ProgressRecorded {
            learner_id: record.learner_id.clone(),
            formation_id: record.formation_id.clone(),
        });
        Ok(record)
    }

    /// Teacher override: may reset or advance a record out of band.
    pub fn record_override(
        &self,
        ctx: &RequestContext,
        input: RecordProgressInput,
    ) -> Result<ProgressRecord, EngineError> {
        let record = self.core.with_events(ctx, |store| {
            let record = build_record(&input);
            store.progress().upsert(&record)?;
            Ok((
                record.clone(),
                vec![EventBody::ProgressOverridden {
                    record: record.clone(),
                }],
            ))
        })?;
        self.core.cache.invalidate(&InvalidationEvent::ProgressRecorded {
            learner_id: record.learner_id.clone(),
            formation_id: record.formation_id.clone(),
        });
        Ok(record)
    }

    /// The learner's position across the formation, or `None` when they have
    /// no resolvable progression.
    pub fn standing(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> Result<Option<Standing>, EngineError> {
        let key = CacheKey::Standing {
            learner_id: learner_id.clone(),
            formation_id: formation_id.clone(),
        };
        if let Some(CacheValue::Standing(hit)) = self.core.cache.get(&key) {
            return Ok(hit);
        }

        let catalog = self.core.store.catalog();
        let levels = catalog.levels(formation_id)?;
        let mut levels_with_lessons = Vec::with_capacity(levels.len());
        for level in levels {
            let lessons = catalog.lessons(&level.id)?;
            levels_with_lessons.push((level, lessons));
        }
        let records = self
            .core
            .store
            .progress()
            .for_formation(learner_id, formation_id)?;
        let progress: HashMap<LessonId, ProgressRecord> = records
            .into_iter()
            .map(|record| (record.lesson_id.clone(), record))
            .collect();

        let standing = formation_standing(&levels_with_lessons, &progress);
        self.core.cache.put(key, CacheValue::Standing(standing));
        Ok(standing)
    }
}

fn build_record(input: &RecordProgressInput) -> ProgressRecord {
    let now = Utc::now();
    ProgressRecord {
        learner_id: input.learner_id.clone(),
        lesson_id: input.lesson_id.clone(),
        formation_id: input.formation_id.clone(),
        status: input.status,
        exercise_done: input.exercise_done,
        completed_at: (input.status == ProgressStatus::Completed).then_some(now),
        updated_at: now,
    }
}

pub struct ChatApi<'a, S: Store, B: Backend, A: AuthProvider> {
    core: &'a Engine<S, B, A>,
}

impl<'a, S: Store, B: Backend, A: AuthProvider> ChatApi<'a, S, B, A> {
    /// The learner-specific view of a scope's stream, in chronological order.
    pub fn visible_messages(
        &self,
        learner_id: &LearnerId,
        lesson_id: &LessonId,
        formation_id: &FormationId,
        promotion_id: Option<PromotionId>,
    ) -> Result<Vec<Message>, EngineError> {
        let scope = ChatScope::new(lesson_id.clone(), formation_id.clone());
        let raw = self.core.store.messages().list_scope(&scope)?;

        let viewer_promotion = match promotion_id {
            Some(id) => Some(id),
            None => self
                .core
                .store
                .promotions()
                .active_membership(learner_id, formation_id)?
                .map(|membership| membership.promotion_id),
        };
        let viewer_standing = self
            .core
            .progress()
            .standing(learner_id, formation_id)?
            .unwrap_or(Standing::ZERO);

        let authored: HashSet<_> = self
            .core
            .store
            .messages()
            .authored_in_scope(&scope, learner_id)?
            .into_iter()
            .collect();

        let senders: HashSet<LearnerId> = raw
            .iter()
            .filter(|message| message.sender_id != *learner_id)
            .map(|message| message.sender_id.clone())
            .collect();
        let mut teachers = HashSet::new();
        let mut sender_standings = HashMap::new();
        for sender in senders {
            if self.core.store.catalog().is_teacher(formation_id, &sender)? {
                teachers.insert(sender.clone());
            }
            match self.core.progress().standing(&sender, formation_id) {
                Ok(Some(standing)) => {
                    sender_standings.insert(sender, standing);
                }
                Ok(None) => {}
                Err(err) => {
                    // Unresolvable sender progression feeds the configured
                    // fail-open/fail-closed policy instead of aborting the read.
                    tracing::warn!(sender = %sender, error = %err, "sender standing unresolvable");
                }
            }
        }

        let viewer = ViewerContext {
            learner_id: learner_id.clone(),
            promotion_id: viewer_promotion,
            standing: viewer_standing,
        };
        let stream = StreamContext {
            authored_by_viewer: authored,
            teachers,
            sender_standings,
        };
        Ok(filter_messages(
            raw,
            &viewer,
            &stream,
            self.core.config.unknown_progression,
        ))
    }

    /// Accepts the message unconditionally: immediate dispatch when online,
    /// otherwise (or on transient failure) a durable queue entry the caller
    /// can render optimistically.
    pub async fn send(
        &self,
        ctx: &RequestContext,
        scope: &ChatScope,
        input: SendMessageInput,
    ) -> Result<Outgoing, EngineError> {
        let sender_id = self.core.auth.current_learner_id();

        if let Some(promotion_id) = &input.promotion_id {
            let membership = self
                .core
                .store
                .promotions()
                .active_membership(&sender_id, &scope.formation_id)?;
            let allowed =
                membership.is_some_and(|membership| membership.promotion_id == *promotion_id);
            if !allowed {
                return Err(MessageError::PermissionDenied {
                    message: "sender is not an active member of the target promotion".to_string(),
                }
                .into());
            }
        }

        let draft = MessageDraft {
            lesson_id: scope.lesson_id.clone(),
            level_id: input.level_id,
            formation_id: scope.formation_id.clone(),
            promotion_id: input.promotion_id,
            sender_id,
            receiver_id: input.receiver_id,
            content: input.content,
            is_system: false,
            is_exercise_submission: input.is_exercise_submission,
            reply_to: input.reply_to,
            created_at: Utc::now(),
        };
        let local_id = LocalMessageId::generate();

        if self.core.connectivity.is_online() {
            let attempt = tokio::time::timeout(
                self.core.config.attempt_timeout(),
                self.core.backend.insert_message(&local_id, &draft),
            )
            .await;
            match attempt {
                Ok(Ok(mut message)) => {
                    message.local_ref = Some(local_id.clone());
                    let stored = self.core.with_events(ctx, |store| {
                        store.messages().upsert(&message)?;
                        Ok((
                            message.clone(),
                            vec![EventBody::MessageAcknowledged {
                                local_id: local_id.clone(),
                                message: message.clone(),
                            }],
                        ))
                    })?;
                    self.core.cache.invalidate(&InvalidationEvent::MessageReceived {
                        formation_id: stored.formation_id.clone(),
                    });
                    return Ok(Outgoing::Delivered(stored));
                }
                Ok(Err(err)) if !err.is_transient() => {
                    return Err(match err {
                        crate::error::BackendError::PermissionDenied { message } => {
                            MessageError::PermissionDenied { message }.into()
                        }
                        crate::error::BackendError::Validation { message } => {
                            MessageError::InvalidInput { message }.into()
                        }
                        other => other.into(),
                    });
                }
                Ok(Err(err)) => {
                    tracing::info!(local_id = %local_id, error = %err, "dispatch failed, queueing");
                }
                Err(_) => {
                    tracing::info!(local_id = %local_id, "dispatch timed out, queueing");
                }
            }
        }

        let pending = self.core.with_events(ctx, |store| {
            let seq = store.outbox().next_seq(scope)?;
            let pending = PendingMessage {
                local_id: local_id.clone(),
                seq,
                state: PendingState::Queued,
                attempts: 0,
                last_error: None,
                draft: draft.clone(),
                created_at: Utc::now(),
            };
            store.outbox().enqueue(&pending)?;
            Ok((
                pending.clone(),
                vec![EventBody::MessageQueued {
                    pending: pending.clone(),
                }],
            ))
        })?;
        Ok(Outgoing::Pending(pending))
    }

    /// Queue entries for a scope, FIFO, for optimistic rendering.
    pub fn pending(&self, scope: &ChatScope) -> Result<Vec<PendingMessage>, EngineError> {
        Ok(self.core.store.outbox().for_scope(scope)?)
    }

    /// Withdraws a message that has not entered replay yet.
    pub fn withdraw(
        &self,
        ctx: &RequestContext,
        local_id: &LocalMessageId,
    ) -> Result<(), EngineError> {
        self.core.with_events(ctx, |store| {
            let pending = store
                .outbox()
                .get(local_id)?
                .ok_or(OutboxError::NotFound)?;
            match pending.state {
                PendingState::Queued => {
                    store.outbox().remove(local_id)?;
                    Ok((
                        (),
                        vec![EventBody::MessageWithdrawn {
                            local_id: local_id.clone(),
                        }],
                    ))
                }
                PendingState::Replaying => Err(OutboxError::AlreadyReplaying.into()),
                PendingState::Failed => Err(OutboxError::InvalidInput {
                    message: "failed messages are resent, not withdrawn".to_string(),
                }
                .into()),
            }
        })
    }

    /// Manual resend of a failed message; attempts start over.
    pub fn resend(
        &self,
        ctx: &RequestContext,
        local_id: &LocalMessageId,
    ) -> Result<PendingMessage, EngineError> {
        self.core.with_events(ctx, |store| {
            let mut pending = store
                .outbox()
                .get(local_id)?
                .ok_or(OutboxError::NotFound)?;
            validate_pending_transition(pending.state, PendingState::Queued)?;
            store
                .outbox()
                .set_state(local_id, PendingState::Queued, 0, None)?;
            pending.state = PendingState::Queued;
            pending.attempts = 0;
            pending.last_error = None;
            Ok((
                pending.clone(),
                vec![EventBody::MessageQueued { pending }],
            ))
        })
    }
}

pub struct CohortApi<'a, S: Store, B: Backend, A: AuthProvider> {
    core: &'a Engine<S, B, A>,
}

impl<'a, S: Store, B: Backend, A: AuthProvider> CohortApi<'a, S, B, A> {
    /// Cohort members visible to the learner when consulting a level, per the
    /// one-directional see-ahead-only-if-already-ahead rule.
    pub fn members(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
        viewed_level_id: &LevelId,
    ) -> Result<Vec<Member>, EngineError> {
        let level = self
            .core
            .store
            .catalog()
            .level(viewed_level_id)?
            .ok_or(ProgressionError::LevelNotFound)?;
        let membership = self
            .core
            .store
            .promotions()
            .active_membership(learner_id, formation_id)?
            .ok_or(CohortError::NoActiveMembership)?;
        let memberships = self
            .core
            .store
            .promotions()
            .active_members(&membership.promotion_id)?;

        let viewer_level_order = self
            .core
            .progress()
            .standing(learner_id, formation_id)?
            .unwrap_or(Standing::ZERO)
            .level_order;

        let mut members = Vec::with_capacity(memberships.len());
        for entry in memberships {
            let level_order = match self.core.progress().standing(&entry.learner_id, formation_id)
            {
                Ok(Some(standing)) => standing.level_order,
                Ok(None) => 0,
                Err(err) => {
                    tracing::warn!(member = %entry.learner_id, error = %err, "member standing unresolvable");
                    0
                }
            };
            members.push(Member {
                learner_id: entry.learner_id,
                promotion_id: entry.promotion_id,
                level_order,
            });
        }

        Ok(cohort::visible_members(
            viewer_level_order,
            level.order_index,
            members,
        ))
    }
}
