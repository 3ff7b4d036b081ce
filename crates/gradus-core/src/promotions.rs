use crate::error::CohortError;
use crate::types::{
    FormationId, LearnerId, Promotion, PromotionId, PromotionMembership,
};
use chrono::{DateTime, Utc};

pub trait PromotionRepository {
    fn promotion(&self, id: &PromotionId) -> Result<Option<Promotion>, CohortError>;
    fn upsert_promotion(&self, promotion: &Promotion) -> Result<(), CohortError>;
    /// The learner's single active membership within a formation, if any.
    fn active_membership(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> Result<Option<PromotionMembership>, CohortError>;
    /// All active members of a promotion, ordered by join time.
    fn active_members(
        &self,
        promotion_id: &PromotionId,
    ) -> Result<Vec<PromotionMembership>, CohortError>;
    /// Enrolls the learner, deactivating any prior membership in the same
    /// formation. Transfer deactivates, it never deletes.
    fn enroll(
        &self,
        learner_id: &LearnerId,
        promotion_id: &PromotionId,
        joined_at: DateTime<Utc>,
    ) -> Result<PromotionMembership, CohortError>;
    /// Raw upsert for sync hydration; carries the authoritative active flag
    /// as-is instead of running enrollment rules.
    fn apply_membership(&self, membership: &PromotionMembership) -> Result<(), CohortError>;
}
