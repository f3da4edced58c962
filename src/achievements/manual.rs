use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait};
use serde_json::json;
use tracing::{debug, warn};

use super::{GrantError, GrantOutcome, Granter, completed_tours, held_badges};
use crate::{
    entities::{achievement, badge_definition, prelude::*},
    rooms::is_unique_violation,
};

/// Grants badges with plain reads and inserts. Works on every backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualGranter;

struct Candidate<'a> {
    definition: &'a badge_definition::Model,
    tour_id: Option<i32>,
}

#[async_trait]
impl Granter for ManualGranter {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn grant(&self, db: &DatabaseConnection, user_id: i32) -> Result<GrantOutcome, GrantError> {
        let completed = completed_tours(db, user_id).await?;
        if completed.count == 0 {
            return Ok(GrantOutcome::default());
        }

        let definitions = BadgeDefinition::find().all(db).await?;
        let mut held: HashSet<String> = held_badges(db, user_id)
            .await?
            .into_iter()
            .map(|a| a.badge_type)
            .collect();

        let mut candidates = Vec::new();
        for &tour_id in &completed.tour_ids {
            let Some(unit) = Tour::find_by_id(tour_id).one(db).await? else {
                continue;
            };
            candidates.extend(
                definitions
                    .iter()
                    .filter(|d| d.category.as_deref() == Some(unit.category.as_str()))
                    .map(|definition| Candidate {
                        definition,
                        tour_id: Some(tour_id),
                    }),
            );
        }
        // Every reached milestone, not just the exact boundary, so a skipped
        // one is repaired on the next call.
        candidates.extend(
            definitions
                .iter()
                .filter(|d| d.reached_by(completed.count))
                .map(|definition| Candidate {
                    definition,
                    tour_id: None,
                }),
        );

        let mut outcome = GrantOutcome::default();
        for candidate in candidates {
            let badge_type = &candidate.definition.badge_type;
            if held.contains(badge_type) {
                continue;
            }
            match insert(db, user_id, &candidate, completed.count).await {
                Ok(granted) => {
                    debug!(user_id, badge_type = %badge_type, "badge granted");
                    held.insert(badge_type.clone());
                    outcome.awarded += 1;
                    outcome.badges.push(granted);
                }
                Err(e) if is_unique_violation(&e) => {
                    debug!(user_id, badge_type = %badge_type, "badge granted concurrently");
                    held.insert(badge_type.clone());
                }
                Err(e) => {
                    warn!(user_id, badge_type = %badge_type, error = %e, "failed to grant badge");
                }
            }
        }
        Ok(outcome)
    }
}

async fn insert(
    db: &DatabaseConnection,
    user_id: i32,
    candidate: &Candidate<'_>,
    completed_count: usize,
) -> Result<achievement::Model, DbErr> {
    let definition = candidate.definition;
    let verification = match candidate.tour_id {
        Some(tour_id) => json!({
            "source": "manual",
            "tour_id": tour_id,
            "completed_count": completed_count,
        }),
        None => json!({
            "source": "manual",
            "completed_count": completed_count,
        }),
    };

    achievement::ActiveModel {
        user_id: Set(user_id),
        badge_type: Set(definition.badge_type.clone()),
        badge_name: Set(definition.badge_name.clone()),
        badge_description: Set(definition.badge_description.clone()),
        tour_id: Set(candidate.tour_id),
        verification_data: Set(Some(verification)),
        unlock_date: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}
