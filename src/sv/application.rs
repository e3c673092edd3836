use std::collections::HashSet;

use sea_orm::sea_query::OnConflict;

use super::release as stored_release;
use crate::{
  entity::{alias, application, owner, release},
  prelude::*,
  registry::{self, ApplicationInfo, Registry, Releases},
};

async fn write<C: ConnectionTrait>(
  conn: &C,
  app: &registry::Application,
) -> Result<()> {
  let info = app.info();

  application::Entity::insert(application::ActiveModel {
    id: Set(info.id),
    identifier: Set(info.identifier),
    display_name: Set(info.display_name),
    description: Set(info.description),
    channel: Set(info.channel),
    webhook: Set(app.webhook().to_string()),
  })
  .on_conflict(
    OnConflict::column(application::Column::Id)
      .update_columns([
        application::Column::Identifier,
        application::Column::DisplayName,
        application::Column::Description,
        application::Column::Channel,
      ])
      .to_owned(),
  )
  .exec(conn)
  .await?;

  alias::Entity::delete_many()
    .filter(alias::Column::ApplicationId.eq(info.id))
    .exec(conn)
    .await?;
  if !info.alias.is_empty() {
    let rows = info.alias.into_iter().enumerate().map(|(i, name)| {
      alias::ActiveModel {
        application_id: Set(info.id),
        alias: Set(name),
        position: Set(i as i32),
      }
    });
    alias::Entity::insert_many(rows).exec(conn).await?;
  }

  owner::Entity::delete_many()
    .filter(owner::Column::ApplicationId.eq(info.id))
    .exec(conn)
    .await?;
  if !info.owner.is_empty() {
    let rows = info.owner.into_iter().map(|principal| owner::ActiveModel {
      application_id: Set(info.id),
      owner: Set(principal),
    });
    owner::Entity::insert_many(rows).exec(conn).await?;
  }

  Ok(())
}

async fn remove<C: ConnectionTrait>(conn: &C, id: i32) -> Result<()> {
  release::Entity::delete_many()
    .filter(release::Column::ApplicationId.eq(id))
    .exec(conn)
    .await?;
  alias::Entity::delete_many()
    .filter(alias::Column::ApplicationId.eq(id))
    .exec(conn)
    .await?;
  owner::Entity::delete_many()
    .filter(owner::Column::ApplicationId.eq(id))
    .exec(conn)
    .await?;
  application::Entity::delete_by_id(id).exec(conn).await?;
  Ok(())
}

pub struct Application<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Application<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Rebuilds the registry from the store.
  pub async fn load(&self) -> Result<Registry> {
    let apps = application::Entity::find()
      .order_by_asc(application::Column::Id)
      .all(self.db)
      .await?;

    let mut aliases: HashMap<i32, Vec<String>> = HashMap::new();
    for row in alias::Entity::find()
      .order_by_asc(alias::Column::Position)
      .all(self.db)
      .await?
    {
      aliases.entry(row.application_id).or_default().push(row.alias);
    }

    let mut owners: HashMap<i32, Vec<i64>> = HashMap::new();
    for row in owner::Entity::find().all(self.db).await? {
      owners.entry(row.application_id).or_default().push(row.owner);
    }

    let mut releases: HashMap<i32, Vec<(String, registry::Release)>> =
      HashMap::new();
    for row in release::Entity::find().all(self.db).await? {
      let id = row.application_id;
      releases.entry(id).or_default().push(stored_release::from_model(row));
    }

    let apps = apps.into_iter().map(|row| {
      let info = ApplicationInfo {
        id: row.id,
        identifier: row.identifier,
        display_name: row.display_name,
        description: row.description,
        alias: aliases.remove(&row.id).unwrap_or_default(),
        owner: owners.remove(&row.id).unwrap_or_default(),
        channel: row.channel,
      };
      let releases: Releases =
        releases.remove(&row.id).unwrap_or_default().into_iter().collect();
      registry::Application::restore(info, row.webhook, releases)
    });

    Registry::from_applications(apps)
  }

  /// Stores every field except releases.
  pub async fn save(&self, app: &registry::Application) -> Result<()> {
    let txn = self.db.begin().await?;
    write(&txn, app).await?;
    txn.commit().await?;
    Ok(())
  }

  pub async fn delete(&self, id: i32) -> Result<()> {
    let txn = self.db.begin().await?;
    remove(&txn, id).await?;
    txn.commit().await?;
    Ok(())
  }

  /// Makes the store mirror the registry, releases included.
  pub async fn flush(&self, registry: &Registry) -> Result<()> {
    let apps = registry.all();
    let live: HashSet<i32> = apps.iter().map(|app| app.id()).collect();

    let txn = self.db.begin().await?;

    let stored = application::Entity::find().all(&txn).await?;
    for row in stored.into_iter().filter(|row| !live.contains(&row.id)) {
      remove(&txn, row.id).await?;
    }

    for app in &apps {
      write(&txn, app).await?;

      let entries = app.release_entries();
      let keys: Vec<&String> = entries.iter().map(|(key, _)| key).collect();
      release::Entity::delete_many()
        .filter(release::Column::ApplicationId.eq(app.id()))
        .filter(release::Column::Key.is_not_in(keys))
        .exec(&txn)
        .await?;

      for (key, release) in &entries {
        stored_release::upsert(&txn, app.id(), key, release).await?;
      }
    }

    txn.commit().await?;
    Ok(())
  }
}
