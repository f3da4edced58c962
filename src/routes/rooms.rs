use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    auth::user::CurrentUser,
    error::ApiError,
    rooms::{self, RoomView},
    router::AppState,
};

pub async fn tour_room(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tour_id): Path<i32>,
) -> Result<Json<RoomView>, ApiError> {
    let view = rooms::open_for(&state.db, tour_id, &user).await?;
    Ok(Json(view))
}
