//! Fixtures for tests: an in-memory SQLite database migrated with the real
//! migrations, plus helpers that insert rows directly.

use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};

use crate::entities::{
    booking,
    sea_orm_active_enums::{BookingStatus, PaymentMethod, PaymentStatus, TourStatus, UserRole},
    tour, user,
};

pub async fn setup_db() -> DatabaseConnection {
    // A single connection keeps every query on the same in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connects");
    Migrator::up(&db, None).await.expect("migrations apply");
    db
}

pub async fn insert_user(db: &DatabaseConnection, full_name: &str, email: &str) -> user::Model {
    insert_user_with_role(db, full_name, email, UserRole::Tourist).await
}

pub async fn insert_user_with_role(
    db: &DatabaseConnection,
    full_name: &str,
    email: &str,
    role: UserRole,
) -> user::Model {
    user::ActiveModel {
        full_name: Set(full_name.to_string()),
        email: Set(email.to_string()),
        phone: Set(None),
        role: Set(role),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("user inserts")
}

pub async fn insert_tour(db: &DatabaseConnection, category: &str, max_participants: i32) -> tour::Model {
    let today = Utc::now().date_naive();
    insert_tour_with(
        db,
        category,
        max_participants,
        TourStatus::Active,
        today + Duration::days(10),
        today + Duration::days(12),
    )
    .await
}

pub async fn insert_tour_with(
    db: &DatabaseConnection,
    category: &str,
    max_participants: i32,
    status: TourStatus,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
) -> tour::Model {
    tour::ActiveModel {
        title: Set(format!("{category} tour")),
        category: Set(category.to_string()),
        max_participants: Set(max_participants),
        current_participants: Set(0),
        status: Set(status),
        start_date: Set(start_date),
        end_date: Set(end_date),
        guide_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("tour inserts")
}

/// Inserts a booking with the given status, bypassing admission. Completion is
/// set by an external collaborator, so tests create those rows directly.
pub async fn insert_booking(
    db: &DatabaseConnection,
    user_id: i32,
    tour_id: i32,
    status: BookingStatus,
) -> booking::Model {
    booking::ActiveModel {
        user_id: Set(user_id),
        tour_id: Set(tour_id),
        num_people: Set(1),
        total_price: Set(Decimal::new(250050, 2)),
        status: Set(status),
        payment_status: Set(PaymentStatus::Paid),
        payment_method: Set(PaymentMethod::Card),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("booking inserts")
}
