use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i32,
  pub identifier: String,
  pub display_name: String,
  pub description: String,
  pub channel: Option<i64>,
  /// Ingestion secret, never rotated
  pub webhook: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::alias::Entity")]
  Alias,
  #[sea_orm(has_many = "super::owner::Entity")]
  Owner,
  #[sea_orm(has_many = "super::release::Entity")]
  Release,
}

impl Related<super::alias::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Alias.def()
  }
}

impl Related<super::owner::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Owner.def()
  }
}

impl Related<super::release::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Release.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
