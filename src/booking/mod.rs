//! Booking admission: turns a purchase request into a booking, its attendees
//! and a capacity reservation, then provisions the chat room and queues the
//! confirmation signals.
//!
//! The booking, attendee and capacity writes commit in one transaction. The
//! capacity write is a conditional increment, so two requests that both saw
//! enough free places cannot both commit.

pub mod attendees;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    entities::{
        attendee, booking,
        sea_orm_active_enums::{BookingStatus, PaymentMethod, TourStatus},
        tour, user,
    },
    outbound::{Notice, Notifier, email::EmailMessage},
    rooms,
};
use attendees::{AttendeeError, AttendeeInput, NewAttendee};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(alias = "unitId")]
    pub tour_id: i32,
    pub num_people: i32,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_data: Option<Value>,
    #[serde(default)]
    pub attendees: Option<Vec<AttendeeInput>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: booking::Model,
    pub attendees: Vec<attendee::Model>,
    pub room_id: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("number of people must be at least 1")]
    InvalidPeopleCount,

    #[error("total price must not be negative")]
    InvalidPrice,

    #[error(transparent)]
    Attendees(#[from] AttendeeError),

    #[error("tour {0} not found")]
    UnitNotFound(i32),

    #[error("tour {0} is not open for booking")]
    UnitNotBookable(i32),

    #[error("tour {0} has already ended")]
    UnitEnded(i32),

    #[error("only {available} places left, {requested} requested")]
    CapacityExceeded { available: i32, requested: i32 },

    #[error("an attendee already holds a booking for this tour, choose different attendees")]
    DuplicateSelfBooking,

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidPeopleCount => "invalid_people_count",
            BookingError::InvalidPrice => "invalid_price",
            BookingError::Attendees(AttendeeError::MissingAttendeeData(_)) => {
                "missing_attendee_data"
            }
            BookingError::Attendees(AttendeeError::AttendeeCountMismatch { .. }) => {
                "attendee_count_mismatch"
            }
            BookingError::Attendees(AttendeeError::InvalidAttendeeName(_)) => {
                "invalid_attendee_name"
            }
            BookingError::UnitNotFound(_) => "unit_not_found",
            BookingError::UnitNotBookable(_) => "unit_not_bookable",
            BookingError::UnitEnded(_) => "unit_ended",
            BookingError::CapacityExceeded { .. } => "capacity_exceeded",
            BookingError::DuplicateSelfBooking => "duplicate_self_booking",
            BookingError::Database(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::InvalidPeopleCount
            | BookingError::InvalidPrice
            | BookingError::Attendees(_)
            | BookingError::UnitNotBookable(_)
            | BookingError::UnitEnded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::UnitNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::CapacityExceeded { .. } | BookingError::DuplicateSelfBooking => {
                StatusCode::CONFLICT
            }
            BookingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct BookingService {
    db: DatabaseConnection,
    notifier: Notifier,
    side_effect_timeout: Duration,
}

impl BookingService {
    pub fn new(db: DatabaseConnection, notifier: Notifier, side_effect_timeout: Duration) -> Self {
        Self {
            db,
            notifier,
            side_effect_timeout,
        }
    }

    pub async fn create(
        &self,
        requester: &user::Model,
        request: CreateBookingRequest,
    ) -> Result<BookingReceipt, BookingError> {
        if request.num_people < 1 {
            return Err(BookingError::InvalidPeopleCount);
        }
        if request.total_price.is_sign_negative() {
            return Err(BookingError::InvalidPrice);
        }
        let people =
            attendees::reconcile(request.num_people, request.attendees.as_deref(), requester)?;
        if request.payment_data.is_some() {
            debug!(user_id = requester.id, "payment data supplied, settled upstream");
        }

        let unit = tour::Entity::find_by_id(request.tour_id)
            .one(&self.db)
            .await?
            .ok_or(BookingError::UnitNotFound(request.tour_id))?;
        check_bookable(&unit)?;

        // Availability comes from the row just read, never from the client.
        let available = unit.available();
        if request.num_people > available {
            return Err(BookingError::CapacityExceeded {
                available,
                requested: request.num_people,
            });
        }

        let has_prior = booking::Entity::find()
            .filter(booking::Column::UserId.eq(requester.id))
            .filter(booking::Column::TourId.eq(unit.id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled))
            .one(&self.db)
            .await?
            .is_some();
        if has_prior && people.iter().any(|a| a.is_requester(requester)) {
            return Err(BookingError::DuplicateSelfBooking);
        }

        let txn = self.db.begin().await?;
        let persisted = match persist(&txn, requester, &unit, &request, &people).await {
            Ok(persisted) => persisted,
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "rollback after failed admission did not complete");
                }
                return Err(e);
            }
        };
        txn.commit().await?;

        let (booking, attendees) = persisted;
        info!(
            booking_id = booking.id,
            tour_id = unit.id,
            user_id = requester.id,
            num_people = booking.num_people,
            "booking admitted"
        );

        let room_id = self.provision_room(&booking).await;
        self.announce(requester, &unit, &booking);

        Ok(BookingReceipt {
            booking,
            attendees,
            room_id,
        })
    }

    /// Room membership is repairable later, so it only gets a bounded attempt.
    async fn provision_room(&self, booking: &booking::Model) -> Option<i32> {
        let attempt = rooms::ensure_membership(
            &self.db,
            booking.tour_id,
            booking.user_id,
            Some(booking.id),
        );
        match tokio::time::timeout(self.side_effect_timeout, attempt).await {
            Ok(Ok(participant)) => Some(participant.room_id),
            Ok(Err(e)) => {
                warn!(booking_id = booking.id, error = %e, "room provisioning failed");
                None
            }
            Err(_) => {
                warn!(booking_id = booking.id, "room provisioning timed out");
                None
            }
        }
    }

    fn announce(&self, requester: &user::Model, unit: &tour::Model, booking: &booking::Model) {
        self.notifier.notify(
            &[requester.id],
            Notice::new(
                "booking_confirmed",
                "Бронирование подтверждено",
                format!(
                    "«{}»: забронировано мест: {}",
                    unit.title, booking.num_people
                ),
            ),
        );
        if let Some(guide_id) = unit.guide_id.filter(|&g| g != requester.id) {
            self.notifier.notify(
                &[guide_id],
                Notice::new(
                    "booking_created",
                    "Новое бронирование",
                    format!(
                        "«{}»: {} чел. от {}",
                        unit.title, booking.num_people, requester.full_name
                    ),
                ),
            );
        }
        self.notifier.email(EmailMessage {
            to: requester.email.clone(),
            subject: format!("Бронирование №{} подтверждено", booking.id),
            text: format!(
                "Здравствуйте, {}!\n\nВаше бронирование тура «{}» ({} - {}) подтверждено.\n\
                 Участников: {}\nСумма: {}\n",
                requester.full_name,
                unit.title,
                unit.start_date,
                unit.end_date,
                booking.num_people,
                booking.total_price
            ),
        });
    }
}

fn check_bookable(unit: &tour::Model) -> Result<(), BookingError> {
    if unit.status != TourStatus::Active {
        return Err(BookingError::UnitNotBookable(unit.id));
    }
    if unit.end_date < Utc::now().date_naive() {
        return Err(BookingError::UnitEnded(unit.id));
    }
    Ok(())
}

async fn persist(
    txn: &DatabaseTransaction,
    requester: &user::Model,
    unit: &tour::Model,
    request: &CreateBookingRequest,
    people: &[NewAttendee],
) -> Result<(booking::Model, Vec<attendee::Model>), BookingError> {
    let booking = booking::ActiveModel {
        user_id: Set(requester.id),
        tour_id: Set(unit.id),
        num_people: Set(request.num_people),
        total_price: Set(request.total_price),
        status: Set(BookingStatus::Confirmed),
        payment_status: Set(request.payment_method.initial_payment_status()),
        payment_method: Set(request.payment_method),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut inserted = Vec::with_capacity(people.len());
    for person in people {
        let row = attendee::ActiveModel {
            booking_id: Set(booking.id),
            first_name: Set(person.first_name.clone()),
            last_name: Set(person.last_name.clone()),
            middle_name: Set(person.middle_name.clone()),
            email: Set(person.email.clone()),
            phone: Set(person.phone.clone()),
            passport_data: Set(person.passport_data.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        inserted.push(row);
    }

    let seats = i32::try_from(inserted.len()).map_err(|_| BookingError::InvalidPeopleCount)?;
    reserve_capacity(txn, unit.id, seats).await?;

    Ok((booking, inserted))
}

/// `current += seats` only while it stays within `max`. Losing a race to
/// another admission shows up as zero affected rows.
async fn reserve_capacity(
    txn: &DatabaseTransaction,
    tour_id: i32,
    seats: i32,
) -> Result<(), BookingError> {
    let result = tour::Entity::update_many()
        .col_expr(
            tour::Column::CurrentParticipants,
            Expr::col(tour::Column::CurrentParticipants).add(seats),
        )
        .filter(tour::Column::Id.eq(tour_id))
        .filter(
            Expr::expr(Expr::col(tour::Column::CurrentParticipants).add(seats))
                .lte(Expr::col(tour::Column::MaxParticipants)),
        )
        .exec(txn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let available = tour::Entity::find_by_id(tour_id)
        .one(txn)
        .await?
        .map(|t| t.available())
        .unwrap_or(0);
    Err(BookingError::CapacityExceeded {
        available,
        requested: seats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::{room_participant, sea_orm_active_enums::PaymentStatus},
        outbound::{self, Dispatch},
        test_util,
    };
    use chrono::Duration as Days;
    use sea_orm::PaginatorTrait;
    use tokio::sync::mpsc::Receiver;

    fn service(db: &DatabaseConnection) -> (BookingService, Receiver<Dispatch>) {
        let (notifier, rx) = outbound::channel(64);
        (
            BookingService::new(db.clone(), notifier, Duration::from_secs(5)),
            rx,
        )
    }

    fn request(tour_id: i32, num_people: i32, attendees: Option<Vec<AttendeeInput>>) -> CreateBookingRequest {
        CreateBookingRequest {
            tour_id,
            num_people,
            total_price: Decimal::new(500050, 2),
            payment_method: PaymentMethod::Card,
            payment_data: None,
            attendees,
        }
    }

    fn person(full_name: &str, email: Option<&str>) -> AttendeeInput {
        AttendeeInput {
            full_name: full_name.to_string(),
            email: email.map(str::to_string),
            phone: None,
            passport_data: None,
        }
    }

    async fn current_participants(db: &DatabaseConnection, tour_id: i32) -> i32 {
        tour::Entity::find_by_id(tour_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .current_participants
    }

    #[tokio::test]
    async fn admits_booking_and_provisions_everything() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        let (service, mut rx) = service(&db);

        let receipt = service
            .create(
                &user,
                request(
                    unit.id,
                    2,
                    Some(vec![
                        person("Анна Смирнова", Some("anna@example.com")),
                        person("Олег Иванович Смирнов", None),
                    ]),
                ),
            )
            .await
            .unwrap();

        assert_eq!(receipt.booking.status, BookingStatus::Confirmed);
        assert_eq!(receipt.booking.payment_status, PaymentStatus::Paid);
        assert_eq!(receipt.attendees.len(), 2);
        assert_eq!(receipt.attendees[1].middle_name.as_deref(), Some("Иванович"));
        assert_eq!(current_participants(&db, unit.id).await, 2);

        let room_id = receipt.room_id.expect("room provisioned");
        let participant = room_participant::Entity::find_by_id((room_id, user.id))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(participant.booking_id, Some(receipt.booking.id));

        let mut queued = Vec::new();
        while let Ok(dispatch) = rx.try_recv() {
            queued.push(dispatch);
        }
        assert!(queued.iter().any(|d| matches!(
            d,
            Dispatch::Push { user_id, notice } if *user_id == user.id && notice.kind == "booking_confirmed"
        )));
        assert!(queued.iter().any(|d| matches!(d, Dispatch::Email(m) if m.to == "anna@example.com")));
    }

    #[tokio::test]
    async fn cash_bookings_stay_payment_pending() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "nature", 5).await;
        let (service, _rx) = service(&db);

        let mut cash = request(unit.id, 1, None);
        cash.payment_method = PaymentMethod::Cash;
        let receipt = service.create(&user, cash).await.unwrap();

        assert_eq!(receipt.booking.payment_status, PaymentStatus::Pending);
        assert_eq!(receipt.booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn rejects_missing_and_closed_units() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let today = Utc::now().date_naive();
        let inactive = test_util::insert_tour_with(
            &db,
            "history",
            10,
            TourStatus::Inactive,
            today + Days::days(3),
            today + Days::days(4),
        )
        .await;
        let ended = test_util::insert_tour_with(
            &db,
            "history",
            10,
            TourStatus::Active,
            today - Days::days(5),
            today - Days::days(1),
        )
        .await;
        let (service, _rx) = service(&db);

        assert!(matches!(
            service.create(&user, request(999, 1, None)).await,
            Err(BookingError::UnitNotFound(999))
        ));
        assert!(matches!(
            service.create(&user, request(inactive.id, 1, None)).await,
            Err(BookingError::UnitNotBookable(id)) if id == inactive.id
        ));
        assert!(matches!(
            service.create(&user, request(ended.id, 1, None)).await,
            Err(BookingError::UnitEnded(id)) if id == ended.id
        ));
        assert_eq!(booking::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_requests_above_remaining_capacity() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 1).await;
        let (service, _rx) = service(&db);

        let result = service
            .create(
                &user,
                request(
                    unit.id,
                    2,
                    Some(vec![person("Анна Смирнова", None), person("Олег Смирнов", None)]),
                ),
            )
            .await;

        assert!(matches!(
            result,
            Err(BookingError::CapacityExceeded {
                available: 1,
                requested: 2
            })
        ));
        assert_eq!(current_participants(&db, unit.id).await, 0);
    }

    #[tokio::test]
    async fn concurrent_requests_never_overbook() {
        let db = test_util::setup_db().await;
        let first = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let second = test_util::insert_user(&db, "Пётр Орлов", "petr@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 2).await;
        let (service, _rx) = service(&db);

        let pair = || Some(vec![person("Гость Один", None), person("Гость Два", None)]);
        let (a, b) = tokio::join!(
            service.create(&first, request(unit.id, 2, pair())),
            service.create(&second, request(unit.id, 2, pair())),
        );

        let outcomes = [a, b];
        let admitted = outcomes.iter().filter(|r| r.is_ok()).count();
        let rejected = outcomes
            .iter()
            .filter(|r| matches!(r, Err(BookingError::CapacityExceeded { .. })))
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(rejected, 1);
        assert_eq!(current_participants(&db, unit.id).await, 2);
        assert_eq!(booking::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(attendee::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn attendee_count_mismatch_writes_nothing() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        let (service, _rx) = service(&db);

        let result = service
            .create(
                &user,
                request(
                    unit.id,
                    3,
                    Some(vec![person("Анна Смирнова", None), person("Олег Смирнов", None)]),
                ),
            )
            .await;

        assert!(matches!(
            result,
            Err(BookingError::Attendees(AttendeeError::AttendeeCountMismatch {
                expected: 3,
                actual: 2
            }))
        ));
        assert_eq!(booking::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_self_booking_is_rejected_without_writes() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        let (service, _rx) = service(&db);

        service.create(&user, request(unit.id, 1, None)).await.unwrap();

        let result = service
            .create(
                &user,
                request(
                    unit.id,
                    2,
                    Some(vec![
                        person("Кто Угодно", Some("ANNA@example.com")),
                        person("Олег Смирнов", None),
                    ]),
                ),
            )
            .await;

        assert!(matches!(result, Err(BookingError::DuplicateSelfBooking)));
        assert_eq!(booking::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(attendee::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(current_participants(&db, unit.id).await, 1);
    }

    #[tokio::test]
    async fn second_booking_for_other_people_is_admitted() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        let (service, _rx) = service(&db);

        let first = service.create(&user, request(unit.id, 1, None)).await.unwrap();
        let second = service
            .create(
                &user,
                request(unit.id, 1, Some(vec![person("Олег Смирнов", Some("oleg@example.com"))])),
            )
            .await
            .unwrap();

        assert_eq!(first.room_id, second.room_id);
        let participants = room_participant::Entity::find().all(&db).await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].booking_id, Some(second.booking.id));
        assert_eq!(current_participants(&db, unit.id).await, 2);
    }

    #[tokio::test]
    async fn cancelled_prior_booking_does_not_block_rebooking() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        test_util::insert_booking(&db, user.id, unit.id, BookingStatus::Cancelled).await;
        let (service, _rx) = service(&db);

        let receipt = service.create(&user, request(unit.id, 1, None)).await;

        assert!(receipt.is_ok());
    }

    #[tokio::test]
    async fn rejects_non_positive_people_count() {
        let db = test_util::setup_db().await;
        let user = test_util::insert_user(&db, "Анна Смирнова", "anna@example.com").await;
        let unit = test_util::insert_tour(&db, "history", 10).await;
        let (service, _rx) = service(&db);

        assert!(matches!(
            service.create(&user, request(unit.id, 0, None)).await,
            Err(BookingError::InvalidPeopleCount)
        ));
    }
}
