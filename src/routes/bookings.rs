use axum::{Json, extract::State, http::StatusCode};

use crate::{
    auth::user::CurrentUser,
    booking::{BookingReceipt, CreateBookingRequest},
    error::ApiError,
    router::AppState,
};

/// Admits a booking for the current user.
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), ApiError> {
    let receipt = state.bookings.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
