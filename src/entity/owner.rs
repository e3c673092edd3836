use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::application;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "application_owners")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub application_id: i32,
  /// Telegram user id
  #[sea_orm(primary_key, auto_increment = false)]
  pub owner: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "application::Entity",
    from = "Column::ApplicationId",
    to = "application::Column::Id",
    on_delete = "Cascade"
  )]
  Application,
}

impl Related<application::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Application.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
