//! Per-tour chat rooms. Provisioning converges under concurrency: the unique
//! `room.tour_id` and the `(room_id, user_id)` key decide every race, and the
//! loser re-reads what the winner wrote.

use axum::http::StatusCode;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::entities::{room, room_participant, tour, user};

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Returns the room of `tour_id`, creating it when absent.
pub async fn ensure_room<C: ConnectionTrait>(
    db: &C,
    tour_id: i32,
    created_by: i32,
) -> Result<room::Model, DbErr> {
    if let Some(existing) = find_room(db, tour_id).await? {
        return Ok(existing);
    }

    let unit = tour::Entity::find_by_id(tour_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("tour {tour_id}")))?;

    let inserted = room::ActiveModel {
        tour_id: Set(tour_id),
        guide_id: Set(unit.guide_id),
        created_by: Set(created_by),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(created) => {
            info!(room_id = created.id, tour_id, "room created");
            Ok(created)
        }
        Err(e) if is_unique_violation(&e) => {
            debug!(tour_id, "room created concurrently, reading winner");
            find_room(db, tour_id)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("room for tour {tour_id}")))
        }
        Err(e) => Err(e),
    }
}

async fn find_room<C: ConnectionTrait>(db: &C, tour_id: i32) -> Result<Option<room::Model>, DbErr> {
    room::Entity::find()
        .filter(room::Column::TourId.eq(tour_id))
        .one(db)
        .await
}

/// Makes `user_id` a participant of the tour's room. An existing membership
/// is kept and re-pointed at `booking_id`.
pub async fn ensure_membership<C: ConnectionTrait>(
    db: &C,
    tour_id: i32,
    user_id: i32,
    booking_id: Option<i32>,
) -> Result<room_participant::Model, DbErr> {
    let room = ensure_room(db, tour_id, user_id).await?;

    let inserted = room_participant::ActiveModel {
        room_id: Set(room.id),
        user_id: Set(user_id),
        booking_id: Set(booking_id),
    }
    .insert(db)
    .await;

    match inserted {
        Ok(participant) => Ok(participant),
        Err(e) if is_unique_violation(&e) => {
            room_participant::Entity::update_many()
                .col_expr(room_participant::Column::BookingId, Expr::value(booking_id))
                .filter(room_participant::Column::RoomId.eq(room.id))
                .filter(room_participant::Column::UserId.eq(user_id))
                .exec(db)
                .await?;
            room_participant::Entity::find_by_id((room.id, user_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    DbErr::RecordNotFound(format!("participant {user_id} of room {}", room.id))
                })
        }
        Err(e) => Err(e),
    }
}

pub async fn participants<C: ConnectionTrait>(
    db: &C,
    room_id: i32,
) -> Result<Vec<room_participant::Model>, DbErr> {
    room_participant::Entity::find()
        .filter(room_participant::Column::RoomId.eq(room_id))
        .order_by_asc(room_participant::Column::UserId)
        .all(db)
        .await
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub room: room::Model,
    pub participants: Vec<room_participant::Model>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomAccessError {
    #[error("tour {0} not found")]
    TourNotFound(i32),

    #[error("tour {0} has no room yet")]
    NoRoom(i32),

    #[error("not a participant of this room")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl RoomAccessError {
    pub fn code(&self) -> &'static str {
        match self {
            RoomAccessError::TourNotFound(_) => "unit_not_found",
            RoomAccessError::NoRoom(_) => "room_not_found",
            RoomAccessError::Forbidden => "forbidden",
            RoomAccessError::Database(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RoomAccessError::TourNotFound(_) | RoomAccessError::NoRoom(_) => StatusCode::NOT_FOUND,
            RoomAccessError::Forbidden => StatusCode::FORBIDDEN,
            RoomAccessError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Guides and admins get the room created on first access. Tourists only see
/// a room they already belong to.
pub async fn open_for<C: ConnectionTrait>(
    db: &C,
    tour_id: i32,
    viewer: &user::Model,
) -> Result<RoomView, RoomAccessError> {
    if tour::Entity::find_by_id(tour_id).one(db).await?.is_none() {
        return Err(RoomAccessError::TourNotFound(tour_id));
    }

    let room = if viewer.is_staff() {
        ensure_room(db, tour_id, viewer.id).await?
    } else {
        find_room(db, tour_id)
            .await?
            .ok_or(RoomAccessError::NoRoom(tour_id))?
    };

    let participants = participants(db, room.id).await?;
    if !viewer.is_staff() && !participants.iter().any(|p| p.user_id == viewer.id) {
        return Err(RoomAccessError::Forbidden);
    }

    Ok(RoomView { room, participants })
}
