use sea_orm_migration::{prelude::*, schema::*, sea_orm::ConnectionTrait};

use crate::iden::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// `(badge_type, badge_name, badge_description, category, milestone)`
const BADGES: &[(&str, &str, &str, Option<&str>, Option<i32>)] = &[
    (
        "history",
        "Историк",
        "Завершил исторический тур",
        Some("history"),
        None,
    ),
    (
        "nature",
        "Натуралист",
        "Завершил тур на природе",
        Some("nature"),
        None,
    ),
    (
        "gastronomy",
        "Гурман",
        "Завершил гастрономический тур",
        Some("gastronomy"),
        None,
    ),
    (
        "architecture",
        "Архитектор",
        "Завершил архитектурный тур",
        Some("architecture"),
        None,
    ),
    (
        "adventure",
        "Искатель приключений",
        "Завершил приключенческий тур",
        Some("adventure"),
        None,
    ),
    (
        "culture",
        "Знаток культуры",
        "Завершил культурный тур",
        Some("culture"),
        None,
    ),
    (
        "first_tour",
        "Первый тур",
        "Завершил первый тур",
        None,
        Some(1),
    ),
    ("tours_10", "10 туров", "Завершил 10 туров", None, Some(10)),
    ("tours_25", "25 туров", "Завершил 25 туров", None, Some(25)),
    ("tours_50", "50 туров", "Завершил 50 туров", None, Some(50)),
    ("tours_100", "100 туров", "Завершил 100 туров", None, Some(100)),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = table_auto(BadgeDefinition::Table)
            .col(string_len(BadgeDefinition::BadgeType, 32).primary_key())
            .col(string(BadgeDefinition::BadgeName))
            .col(string_null(BadgeDefinition::BadgeDescription))
            .col(string_len_null(BadgeDefinition::Category, 32))
            .col(integer_null(BadgeDefinition::Milestone))
            .to_owned();
        manager.create_table(table).await?;

        let table = table_auto(Achievement::Table)
            .col(pk_auto(Achievement::Id))
            .col(integer(Achievement::UserId))
            .col(string_len(Achievement::BadgeType, 32))
            .col(string(Achievement::BadgeName))
            .col(string_null(Achievement::BadgeDescription))
            .col(integer_null(Achievement::TourId))
            .col(json_null(Achievement::VerificationData))
            .col(timestamp(Achievement::UnlockDate))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_achievement_user")
                    .from(Achievement::Table, Achievement::UserId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_achievement_tour")
                    .from(Achievement::Table, Achievement::TourId)
                    .to(Tour::Table, Tour::Id)
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .to_owned();
        manager.create_table(table).await?;

        // The backstop for concurrent grants: one badge per user and type.
        manager
            .create_index(
                Index::create()
                    .name("idx_achievement_user_badge")
                    .table(Achievement::Table)
                    .col(Achievement::UserId)
                    .col(Achievement::BadgeType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let table = table_auto(Notification::Table)
            .col(pk_auto(Notification::Id))
            .col(integer(Notification::UserId))
            .col(string(Notification::Title))
            .col(text(Notification::Body))
            .col(string_len(Notification::Kind, 32))
            .col(boolean(Notification::IsRead).default(false))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_notification_user")
                    .from(Notification::Table, Notification::UserId)
                    .to(AppUser::Table, AppUser::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .to_owned(),
            )
            .await?;

        let mut insert = Query::insert();
        insert.into_table(BadgeDefinition::Table).columns([
            BadgeDefinition::BadgeType,
            BadgeDefinition::BadgeName,
            BadgeDefinition::BadgeDescription,
            BadgeDefinition::Category,
            BadgeDefinition::Milestone,
        ]);
        for (badge_type, name, description, category, milestone) in BADGES {
            insert.values_panic([
                (*badge_type).into(),
                (*name).into(),
                (*description).into(),
                (*category).into(),
                (*milestone).into(),
            ]);
        }
        let db = manager.get_connection();
        db.execute(db.get_database_backend().build(&insert)).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Achievement::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(BadgeDefinition::Table).to_owned())
            .await?;

        Ok(())
    }
}
