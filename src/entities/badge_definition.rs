//! Badge rules shared by both granting paths. A definition is either tied to
//! a tour category or to a completed-tour milestone.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "badge_definition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub badge_type: String,
    pub badge_name: String,
    pub badge_description: Option<String>,
    pub category: Option<String>,
    pub milestone: Option<i32>,
}

impl Model {
    pub fn reached_by(&self, completed: usize) -> bool {
        self.milestone
            .and_then(|m| usize::try_from(m).ok())
            .is_some_and(|m| m > 0 && m <= completed)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
