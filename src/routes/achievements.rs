use axum::{Json, extract::State};
use serde::Serialize;

use crate::{auth::user::CurrentUser, router::AppState};

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub awarded: usize,
}

/// Re-evaluates the caller's badges. Never fails for an authenticated caller.
pub async fn repair_achievements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<RepairResponse> {
    let awarded = state.achievements.award_for_user(user.id).await;
    Json(RepairResponse { awarded })
}
