pub use sea_orm_migration::prelude::*;

mod iden;
mod m20250902_101500_create_booking_tables;
mod m20250902_103000_create_room_tables;
mod m20250910_090000_create_achievement_tables;
mod m20250910_091500_award_tour_achievements_procedure;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250902_101500_create_booking_tables::Migration),
            Box::new(m20250902_103000_create_room_tables::Migration),
            Box::new(m20250910_090000_create_achievement_tables::Migration),
            Box::new(m20250910_091500_award_tour_achievements_procedure::Migration),
        ]
    }
}
