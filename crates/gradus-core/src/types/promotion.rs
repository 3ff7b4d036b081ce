use crate::types::ids::{FormationId, LearnerId, PromotionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub formation_id: FormationId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionMembership {
    pub learner_id: LearnerId,
    pub promotion_id: PromotionId,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
}

/// A cohort member as returned to the application layer, annotated with the
/// order index of the level the member currently stands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub learner_id: LearnerId,
    pub promotion_id: PromotionId,
    pub level_order: i64,
}
