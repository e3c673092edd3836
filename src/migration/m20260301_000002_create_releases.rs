use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_applications::Applications;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Releases::Table)
          .if_not_exists()
          .col(ColumnDef::new(Releases::ApplicationId).integer().not_null())
          .col(ColumnDef::new(Releases::Key).string().not_null())
          .col(ColumnDef::new(Releases::Version).string().not_null())
          .col(ColumnDef::new(Releases::Title).string().not_null())
          .col(ColumnDef::new(Releases::Patchnotes).text().not_null())
          .col(
            ColumnDef::new(Releases::DevBuild)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Releases::Checksum).string().not_null())
          .col(ColumnDef::new(Releases::File).string().not_null())
          .col(ColumnDef::new(Releases::Published).date_time().not_null())
          .primary_key(
            Index::create().col(Releases::ApplicationId).col(Releases::Key),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_releases_application")
              .from(Releases::Table, Releases::ApplicationId)
              .to(Applications::Table, Applications::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Releases::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Releases {
  Table,
  ApplicationId,
  Key,
  Version,
  Title,
  Patchnotes,
  DevBuild,
  Checksum,
  File,
  Published,
}
