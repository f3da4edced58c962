pub use super::badge_definition::Entity as BadgeDefinition;
pub use super::tour::Entity as Tour;
