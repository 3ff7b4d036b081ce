use crate::progression::ActiveLesson;
use crate::types::{FormationId, LearnerId, LevelId, Standing};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ActiveLesson {
        learner_id: LearnerId,
        level_id: LevelId,
        formation_id: FormationId,
    },
    Standing {
        learner_id: LearnerId,
        formation_id: FormationId,
    },
}

impl CacheKey {
    fn formation(&self) -> &FormationId {
        match self {
            Self::ActiveLesson { formation_id, .. } | Self::Standing { formation_id, .. } => {
                formation_id
            }
        }
    }

    fn learner(&self) -> &LearnerId {
        match self {
            Self::ActiveLesson { learner_id, .. } | Self::Standing { learner_id, .. } => learner_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    ActiveLesson(ActiveLesson),
    Standing(Option<Standing>),
}

/// The named events allowed to invalidate cached reads. Nothing else touches
/// the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    ProgressRecorded {
        learner_id: LearnerId,
        formation_id: FormationId,
    },
    MessageReceived {
        formation_id: FormationId,
    },
    MembershipChanged {
        formation_id: FormationId,
    },
    ConnectivityRegained,
}

/// Keyed read-through cache for progression lookups. Single writer per
/// client; the mutex only guards against concurrent readers.
pub struct ReadCache {
    inner: Mutex<HashMap<CacheKey, CacheValue>>,
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    pub fn put(&self, key: CacheKey, value: CacheValue) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key, value);
        }
    }

    pub fn invalidate(&self, event: &InvalidationEvent) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        match event {
            InvalidationEvent::ProgressRecorded {
                learner_id,
                formation_id,
            } => {
                map.retain(|key, _| {
                    !(key.learner() == learner_id && key.formation() == formation_id)
                });
            }
            InvalidationEvent::MessageReceived { formation_id }
            | InvalidationEvent::MembershipChanged { formation_id } => {
                map.retain(|key, _| key.formation() != formation_id);
            }
            InvalidationEvent::ConnectivityRegained => map.clear(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }
}
