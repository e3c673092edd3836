//! Release entity - published versions of an application

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::application;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "releases")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub application_id: i32,
  /// Key in the application's release map
  #[sea_orm(primary_key, auto_increment = false)]
  pub key: String,
  pub version: String,
  pub title: String,
  #[sea_orm(column_type = "Text")]
  pub patchnotes: String,
  pub dev_build: bool,
  pub checksum: String,
  pub file: String,
  pub published: DateTime,
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
