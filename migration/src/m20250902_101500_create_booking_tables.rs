use sea_orm_migration::{prelude::*, schema::*};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Profiles are owned by the auth collaborator; we only read them.
        let table = table_auto(AppUser::Table)
            .col(pk_auto(AppUser::Id))
            .col(string(AppUser::FullName))
            .col(string_uniq(AppUser::Email))
            .col(string_null(AppUser::Phone))
            .col(string_len(AppUser::Role, 16).default("tourist"))
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(Tour::Table)
            .col(pk_auto(Tour::Id))
            .col(string(Tour::Title))
            .col(string_len(Tour::Category, 32))
            .col(integer(Tour::MaxParticipants))
            .col(integer(Tour::CurrentParticipants).default(0))
            .col(string_len(Tour::Status, 16).default("active"))
            .col(date(Tour::StartDate))
            .col(date(Tour::EndDate))
            .col(integer_null(Tour::GuideId))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_tour_guide")
                    .from(Tour::Table, Tour::GuideId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .check(
                Expr::col(Tour::CurrentParticipants)
                    .gte(0)
                    .and(Expr::col(Tour::CurrentParticipants).lte(Expr::col(Tour::MaxParticipants))),
            )
            .check(Expr::col(Tour::EndDate).gte(Expr::col(Tour::StartDate)))
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(Booking::Table)
            .col(pk_auto(Booking::Id))
            .col(integer(Booking::UserId))
            .col(integer(Booking::TourId))
            .col(integer(Booking::NumPeople))
            .col(decimal_len(Booking::TotalPrice, 12, 2))
            .col(string_len(Booking::Status, 16))
            .col(string_len(Booking::PaymentStatus, 16))
            .col(string_len(Booking::PaymentMethod, 16))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_booking_user")
                    .from(Booking::Table, Booking::UserId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_booking_tour")
                    .from(Booking::Table, Booking::TourId)
                    .to(Tour::Table, Tour::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .check(Expr::col(Booking::NumPeople).gte(1))
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(Attendee::Table)
            .col(pk_auto(Attendee::Id))
            .col(integer(Attendee::BookingId))
            .col(string(Attendee::FirstName))
            .col(string(Attendee::LastName))
            .col(string_null(Attendee::MiddleName))
            .col(string_null(Attendee::Email))
            .col(string_null(Attendee::Phone))
            .col(json_null(Attendee::PassportData))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_attendee_booking")
                    .from(Attendee::Table, Attendee::BookingId)
                    .to(Booking::Table, Booking::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user_tour")
                    .table(Booking::Table)
                    .col(Booking::UserId)
                    .col(Booking::TourId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user_status")
                    .table(Booking::Table)
                    .col(Booking::UserId)
                    .col(Booking::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendee_booking")
                    .table(Attendee::Table)
                    .col(Attendee::BookingId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendee::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tour::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await?;

        Ok(())
    }
}
