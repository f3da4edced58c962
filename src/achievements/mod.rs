//! Badge awarding for completed tours.
//!
//! Two interchangeable granters implement the same rules, both reading them
//! from `badge_definition`: [`atomic::AtomicGranter`] delegates to the
//! `award_tour_achievements` database function, [`manual::ManualGranter`]
//! does read-then-insert from here. The unique `(user_id, badge_type)` index
//! keeps either one at-most-once under concurrent calls.

pub mod atomic;
pub mod manual;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::{info, warn};

use crate::{
    entities::{achievement, booking, sea_orm_active_enums::BookingStatus},
    outbound::{Notice, Notifier},
};
pub use atomic::detect_granter;
pub use manual::ManualGranter;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantOutcome {
    pub awarded: usize,
    pub badges: Vec<achievement::Model>,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    /// The granting mechanism is missing; the caller should fall back.
    #[error("granting procedure is unavailable")]
    Unavailable,

    #[error(transparent)]
    Database(#[from] DbErr),
}

#[async_trait]
pub trait Granter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn grant(&self, db: &DatabaseConnection, user_id: i32) -> Result<GrantOutcome, GrantError>;
}

/// Completed bookings of one user, in tour order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedTours {
    pub tour_ids: Vec<i32>,
    pub count: usize,
}

pub async fn completed_tours(db: &DatabaseConnection, user_id: i32) -> Result<CompletedTours, DbErr> {
    let completed = booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .filter(booking::Column::Status.eq(BookingStatus::Completed))
        .order_by_asc(booking::Column::TourId)
        .all(db)
        .await?;

    let mut tour_ids: Vec<i32> = completed.iter().map(|b| b.tour_id).collect();
    tour_ids.dedup();
    Ok(CompletedTours {
        tour_ids,
        count: completed.len(),
    })
}

pub(crate) async fn held_badges(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<achievement::Model>, DbErr> {
    achievement::Entity::find()
        .filter(achievement::Column::UserId.eq(user_id))
        .order_by_asc(achievement::Column::Id)
        .all(db)
        .await
}

pub struct AchievementEngine {
    db: DatabaseConnection,
    granter: Arc<dyn Granter>,
    fallback: ManualGranter,
    notifier: Notifier,
}

impl AchievementEngine {
    pub fn new(db: DatabaseConnection, granter: Arc<dyn Granter>, notifier: Notifier) -> Self {
        Self {
            db,
            granter,
            fallback: ManualGranter,
            notifier,
        }
    }

    pub fn granter_name(&self) -> &'static str {
        self.granter.name()
    }

    /// Grants every badge the user qualifies for and does not hold yet.
    /// Returns how many were newly granted; failures are logged and count as 0.
    pub async fn award_for_user(&self, user_id: i32) -> usize {
        let outcome = match self.granter.grant(&self.db, user_id).await {
            Ok(outcome) => outcome,
            Err(GrantError::Unavailable) => {
                warn!(
                    user_id,
                    granter = self.granter.name(),
                    "granter unavailable, falling back"
                );
                match self.fallback.grant(&self.db, user_id).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(user_id, error = %e, "fallback granting failed");
                        return 0;
                    }
                }
            }
            Err(GrantError::Database(e)) => {
                warn!(user_id, granter = self.granter.name(), error = %e, "granting failed");
                return 0;
            }
        };

        if outcome.awarded > 0 {
            info!(user_id, awarded = outcome.awarded, "achievements granted");
        }
        self.announce(user_id, &outcome);
        outcome.awarded
    }

    fn announce(&self, user_id: i32, outcome: &GrantOutcome) {
        if outcome.badges.is_empty() && outcome.awarded > 0 {
            self.notifier.notify(
                &[user_id],
                Notice::new(
                    "achievement",
                    "Новые достижения",
                    format!("Получено достижений: {}", outcome.awarded),
                ),
            );
            return;
        }
        for badge in &outcome.badges {
            self.notifier.notify(
                &[user_id],
                Notice::new(
                    "achievement",
                    "Новое достижение",
                    format!("Вы получили достижение «{}»", badge.badge_name),
                ),
            );
        }
    }
}
