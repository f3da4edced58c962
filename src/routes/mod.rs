pub mod achievements;
pub mod bookings;
pub mod health;
pub mod rooms;
