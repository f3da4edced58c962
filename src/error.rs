use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::{booking::BookingError, rooms::RoomAccessError};

/// JSON error body `{ "error": code, "message": text }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        if let BookingError::Database(e) = &err {
            error!(error = %e, "booking failed on the database");
            return Self::internal();
        }
        Self::new(err.status(), err.code(), err.to_string())
    }
}

impl From<RoomAccessError> for ApiError {
    fn from(err: RoomAccessError) -> Self {
        if let RoomAccessError::Database(e) = &err {
            error!(error = %e, "room access failed on the database");
            return Self::internal();
        }
        Self::new(err.status(), err.code(), err.to_string())
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        error!(error = %err, "database error");
        Self::internal()
    }
}
