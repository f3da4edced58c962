use sea_orm_migration::{prelude::*, schema::*};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One room per tour: the unique tour_id settles concurrent first bookings.
        let table = table_auto(Room::Table)
            .col(pk_auto(Room::Id))
            .col(integer_uniq(Room::TourId))
            .col(integer_null(Room::GuideId))
            .col(integer(Room::CreatedBy))
            .col(boolean(Room::IsActive).default(true))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_room_tour")
                    .from(Room::Table, Room::TourId)
                    .to(Tour::Table, Tour::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_room_guide")
                    .from(Room::Table, Room::GuideId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(RoomParticipant::Table)
            .col(integer(RoomParticipant::RoomId))
            .col(integer(RoomParticipant::UserId))
            .col(integer_null(RoomParticipant::BookingId))
            .primary_key(
                Index::create()
                    .name("pk_room_participant")
                    .col(RoomParticipant::RoomId)
                    .col(RoomParticipant::UserId),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_room_participant_room")
                    .from(RoomParticipant::Table, RoomParticipant::RoomId)
                    .to(Room::Table, Room::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_room_participant_user")
                    .from(RoomParticipant::Table, RoomParticipant::UserId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_room_participant_booking")
                    .from(RoomParticipant::Table, RoomParticipant::BookingId)
                    .to(Booking::Table, Booking::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .to_owned();
        manager.create_table(table).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoomParticipant::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Room::Table).to_owned())
            .await?;

        Ok(())
    }
}
