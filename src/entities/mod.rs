pub mod prelude;

pub mod achievement;
pub mod attendee;
pub mod badge_definition;
pub mod booking;
pub mod notification;
pub mod room;
pub mod room_participant;
pub mod sea_orm_active_enums;
pub mod tour;
pub mod user;
