use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub enum AppUser {
    Table,
    Id,
    FullName,
    Email,
    Phone,
    Role,
}

#[derive(DeriveIden)]
pub enum Tour {
    Table,
    Id,
    Title,
    Category,
    MaxParticipants,
    CurrentParticipants,
    Status,
    StartDate,
    EndDate,
    GuideId,
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    UserId,
    TourId,
    NumPeople,
    TotalPrice,
    Status,
    PaymentStatus,
    PaymentMethod,
}

#[derive(DeriveIden)]
pub enum Attendee {
    Table,
    Id,
    BookingId,
    FirstName,
    LastName,
    MiddleName,
    Email,
    Phone,
    PassportData,
}

#[derive(DeriveIden)]
pub enum Room {
    Table,
    Id,
    TourId,
    GuideId,
    CreatedBy,
    IsActive,
}

#[derive(DeriveIden)]
pub enum RoomParticipant {
    Table,
    RoomId,
    UserId,
    BookingId,
}

#[derive(DeriveIden)]
pub enum BadgeDefinition {
    Table,
    BadgeType,
    BadgeName,
    BadgeDescription,
    Category,
    Milestone,
}

#[derive(DeriveIden)]
pub enum Achievement {
    Table,
    Id,
    UserId,
    BadgeType,
    BadgeName,
    BadgeDescription,
    TourId,
    VerificationData,
    UnlockDate,
}

#[derive(DeriveIden)]
pub enum Notification {
    Table,
    Id,
    UserId,
    Title,
    Body,
    Kind,
    IsRead,
}
