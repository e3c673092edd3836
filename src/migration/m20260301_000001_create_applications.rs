use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Applications::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Applications::Id)
              .integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Applications::Identifier).string().not_null())
          .col(ColumnDef::new(Applications::DisplayName).string().not_null())
          .col(
            ColumnDef::new(Applications::Description)
              .text()
              .not_null()
              .default(""),
          )
          .col(ColumnDef::new(Applications::Channel).big_integer().null())
          .col(ColumnDef::new(Applications::Webhook).string().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(ApplicationAliases::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(ApplicationAliases::ApplicationId)
              .integer()
              .not_null(),
          )
          .col(ColumnDef::new(ApplicationAliases::Alias).string().not_null())
          .col(
            ColumnDef::new(ApplicationAliases::Position)
              .integer()
              .not_null()
              .default(0),
          )
          .primary_key(
            Index::create()
              .col(ApplicationAliases::ApplicationId)
              .col(ApplicationAliases::Alias),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_aliases_application")
              .from(ApplicationAliases::Table, ApplicationAliases::ApplicationId)
              .to(Applications::Table, Applications::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(ApplicationOwners::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(ApplicationOwners::ApplicationId)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(ApplicationOwners::Owner).big_integer().not_null(),
          )
          .primary_key(
            Index::create()
              .col(ApplicationOwners::ApplicationId)
              .col(ApplicationOwners::Owner),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_owners_application")
              .from(ApplicationOwners::Table, ApplicationOwners::ApplicationId)
              .to(Applications::Table, Applications::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_owners_owner")
          .table(ApplicationOwners::Table)
          .col(ApplicationOwners::Owner)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(ApplicationOwners::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(ApplicationAliases::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(Applications::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Applications {
  Table,
  Id,
  Identifier,
  DisplayName,
  Description,
  Channel,
  Webhook,
}

#[derive(DeriveIden)]
pub enum ApplicationAliases {
  Table,
  ApplicationId,
  Alias,
  Position,
}

#[derive(DeriveIden)]
pub enum ApplicationOwners {
  Table,
  ApplicationId,
  Owner,
}
