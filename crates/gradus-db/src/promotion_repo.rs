use crate::util::{decode_ts, encode_ts};
use chrono::{DateTime, Utc};
use gradus_core::error::CohortError;
use gradus_core::promotions::PromotionRepository;
use gradus_core::types::{FormationId, LearnerId, Promotion, PromotionId, PromotionMembership};
use rusqlite::Connection;
use std::str::FromStr;

pub struct PromotionRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> PromotionRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn db_err(err: impl std::fmt::Display) -> CohortError {
    CohortError::InvalidInput {
        message: err.to_string(),
    }
}

impl<'a> PromotionRepository for PromotionRepo<'a> {
    fn promotion(&self, id: &PromotionId) -> Result<Option<Promotion>, CohortError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, formation_id, name FROM promotions WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = stmt.query([id.as_str()]).map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_promotion_row(row).map(Some)
    }

    fn upsert_promotion(&self, promotion: &Promotion) -> Result<(), CohortError> {
        let sql = "INSERT INTO promotions (id, formation_id, name) VALUES (?1, ?2, ?3) ON CONFLICT(id) DO UPDATE SET formation_id = ?2, name = ?3";
        self.conn
            .execute(
                sql,
                (
                    promotion.id.as_str(),
                    promotion.formation_id.as_str(),
                    promotion.name.clone(),
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn active_membership(
        &self,
        learner_id: &LearnerId,
        formation_id: &FormationId,
    ) -> Result<Option<PromotionMembership>, CohortError> {
        let sql = "SELECT m.learner_id, m.promotion_id, m.joined_at, m.active FROM promotion_memberships m JOIN promotions p ON p.id = m.promotion_id WHERE m.learner_id = ?1 AND p.formation_id = ?2 AND m.active = 1";
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let mut rows = stmt
            .query([learner_id.as_str(), formation_id.as_str()])
            .map_err(db_err)?;
        let Some(row) = rows.next().map_err(db_err)? else {
            return Ok(None);
        };
        map_membership_row(row).map(Some)
    }

    fn active_members(
        &self,
        promotion_id: &PromotionId,
    ) -> Result<Vec<PromotionMembership>, CohortError> {
        let sql = "SELECT learner_id, promotion_id, joined_at, active FROM promotion_memberships WHERE promotion_id = ?1 AND active = 1 ORDER BY joined_at ASC";
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let mut rows = stmt.query([promotion_id.as_str()]).map_err(db_err)?;
        let mut members = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            members.push(map_membership_row(row)?);
        }
        Ok(members)
    }

    fn enroll(
        &self,
        learner_id: &LearnerId,
        promotion_id: &PromotionId,
        joined_at: DateTime<Utc>,
    ) -> Result<PromotionMembership, CohortError> {
        let Some(promotion) = self.promotion(promotion_id)? else {
            return Err(CohortError::PromotionNotFound);
        };
        // Transfer within a formation deactivates the old membership first.
        let deactivate = "UPDATE promotion_memberships SET active = 0 WHERE learner_id = ?1 AND promotion_id IN (SELECT id FROM promotions WHERE formation_id = ?2)";
        self.conn
            .execute(
                deactivate,
                [learner_id.as_str(), promotion.formation_id.as_str()],
            )
            .map_err(db_err)?;

        let membership = PromotionMembership {
            learner_id: learner_id.clone(),
            promotion_id: promotion_id.clone(),
            joined_at,
            active: true,
        };
        self.apply_membership(&membership)?;
        Ok(membership)
    }

    fn apply_membership(&self, membership: &PromotionMembership) -> Result<(), CohortError> {
        let sql = "INSERT INTO promotion_memberships (learner_id, promotion_id, joined_at, active) VALUES (?1, ?2, ?3, ?4) ON CONFLICT(learner_id, promotion_id) DO UPDATE SET joined_at = ?3, active = ?4";
        self.conn
            .execute(
                sql,
                (
                    membership.learner_id.as_str(),
                    membership.promotion_id.as_str(),
                    encode_ts(&membership.joined_at),
                    membership.active,
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }
}

fn map_promotion_row(row: &rusqlite::Row<'_>) -> Result<Promotion, CohortError> {
    let id: String = row.get(0).map_err(db_err)?;
    let formation_id: String = row.get(1).map_err(db_err)?;
    let name: String = row.get(2).map_err(db_err)?;
    Ok(Promotion {
        id: PromotionId::from_str(&id).map_err(db_err)?,
        formation_id: FormationId::from_str(&formation_id).map_err(db_err)?,
        name,
    })
}

fn map_membership_row(row: &rusqlite::Row<'_>) -> Result<PromotionMembership, CohortError> {
    let learner_id: String = row.get(0).map_err(db_err)?;
    let promotion_id: String = row.get(1).map_err(db_err)?;
    let joined_at: String = row.get(2).map_err(db_err)?;
    let active: bool = row.get(3).map_err(db_err)?;
    Ok(PromotionMembership {
        learner_id: LearnerId::from_str(&learner_id).map_err(db_err)?,
        promotion_id: PromotionId::from_str(&promotion_id).map_err(db_err)?,
        joined_at: decode_ts(&joined_at).map_err(db_err)?,
        active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;

    fn seed_promotion(repo: &PromotionRepo<'_>, formation: &FormationId, name: &str) -> Promotion {
        let promotion = Promotion {
            id: PromotionId::generate(),
            formation_id: formation.clone(),
            name: name.to_string(),
        };
        repo.upsert_promotion(&promotion).unwrap();
        promotion
    }

    #[test]
    fn enroll_keeps_one_active_membership_per_formation() {
        let conn = with_test_db().unwrap();
        let repo = PromotionRepo::new(&conn);
        let formation = FormationId::generate();
        let first = seed_promotion(&repo, &formation, "2025 spring");
        let second = seed_promotion(&repo, &formation, "2025 autumn");
        let learner = LearnerId::generate();

        repo.enroll(&learner, &first.id, Utc::now()).unwrap();
        repo.enroll(&learner, &second.id, Utc::now()).unwrap();

        let active = repo.active_membership(&learner, &formation).unwrap().unwrap();
        assert_eq!(active.promotion_id, second.id);
        assert!(repo.active_members(&first.id).unwrap().is_empty());
    }

    #[test]
    fn enroll_rejects_unknown_promotion() {
        let conn = with_test_db().unwrap();
        let repo = PromotionRepo::new(&conn);
        let err = repo
            .enroll(&LearnerId::generate(), &PromotionId::generate(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CohortError::PromotionNotFound));
    }

    #[test]
    fn active_members_orders_by_join_time() {
        let conn = with_test_db().unwrap();
        let repo = PromotionRepo::new(&conn);
        let formation = FormationId::generate();
        let promotion = seed_promotion(&repo, &formation, "2025");
        let early = LearnerId::generate();
        let late = LearnerId::generate();

        let base = Utc::now();
        repo.enroll(&late, &promotion.id, base + chrono::Duration::seconds(10))
            .unwrap();
        repo.enroll(&early, &promotion.id, base).unwrap();

        let members = repo.active_members(&promotion.id).unwrap();
        let ids: Vec<&LearnerId> = members.iter().map(|m| &m.learner_id).collect();
        assert_eq!(ids, vec![&early, &late]);
    }
}
