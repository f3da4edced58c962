use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    achievements::AchievementEngine,
    booking::BookingService,
    routes::{
        achievements::repair_achievements, bookings::create_booking, health::health,
        rooms::tour_room,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub bookings: Arc<BookingService>,
    pub achievements: Arc<AchievementEngine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/bookings", post(create_booking))
        .route("/api/achievements/repair", post(repair_achievements))
        .route("/api/tours/{tour_id}/room", get(tour_room))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        achievements::ManualGranter, entities::sea_orm_active_enums::BookingStatus, outbound,
        test_util,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app(db: &DatabaseConnection) -> Router {
        let (notifier, _outbox) = outbound::channel(64);
        create_router(AppState {
            db: db.clone(),
            bookings: Arc::new(BookingService::new(
                db.clone(),
                notifier.clone(),
                Duration::from_secs(5),
            )),
            achievements: Arc::new(AchievementEngine::new(
                db.clone(),
                Arc::new(ManualGranter),
                notifier,
            )),
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, user_id: Option<i32>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(id) = user_id {
            builder = builder.header("x-user-id", id.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let db = test_util::setup_db().await;
        let response = app(&db)
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn booking_requires_a_known_user() {
        let db = test_util::setup_db().await;
        let unit = test_util::insert_tour(&db, "history", 5).await;
        let body = json!({
            "tourId": unit.id,
            "numPeople": 1,
            "totalPrice": "1500.50",
            "paymentMethod": "card",
        });

        let (status, error) = send(app(&db).await, post_json("/api/bookings", None, body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["error"], "unauthorized");

        let (status, _) = send(app(&db).await, post_json("/api/bookings", Some(77), body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn booking_is_created_and_errors_are_structured() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 2).await;

        let (status, receipt) = send(
            app(&db).await,
            post_json(
                "/api/bookings",
                Some(user.id),
                json!({
                    "unitId": unit.id,
                    "numPeople": 2,
                    "totalPrice": "3000.50",
                    "paymentMethod": "cash",
                    "attendees": [
                        { "fullName": "Анна Смирнова", "email": "anna@example.com" },
                        { "fullName": "Олег Смирнов" }
                    ]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(receipt["booking"]["payment_status"], "pending");
        assert_eq!(receipt["attendees"].as_array().map(Vec::len), Some(2));

        let (status, error) = send(
            app(&db).await,
            post_json(
                "/api/bookings",
                Some(user.id),
                json!({
                    "tourId": unit.id,
                    "numPeople": 1,
                    "totalPrice": "1500.50",
                    "paymentMethod": "card",
                    "attendees": [{ "fullName": "Пётр Орлов" }]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"], "capacity_exceeded");
    }

    #[tokio::test]
    async fn repair_reports_awarded_count() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "adventure", 5).await;
        test_util::insert_booking(&db, user.id, unit.id, BookingStatus::Completed).await;

        let (status, body) = send(
            app(&db).await,
            post_json("/api/achievements/repair", Some(user.id), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "awarded": 2 }));

        let (_, body) = send(
            app(&db).await,
            post_json("/api/achievements/repair", Some(user.id), json!({})),
        )
        .await;
        assert_eq!(body, json!({ "awarded": 0 }));
    }

    #[tokio::test]
    async fn tourists_cannot_open_rooms_they_do_not_belong_to() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "culture", 5).await;

        let request = Request::get(format!("/api/tours/{}/room", unit.id))
            .header("x-user-id", user.id.to_string())
            .body(Body::empty())
            .unwrap();
        let (status, error) = send(app(&db).await, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"], "room_not_found");
    }
}
