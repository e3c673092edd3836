use sea_orm::sea_query::OnConflict;

use crate::{entity::release, prelude::*, registry};

pub(super) fn active_model(
  application_id: i32,
  key: &str,
  release: &registry::Release,
) -> release::ActiveModel {
  release::ActiveModel {
    application_id: Set(application_id),
    key: Set(key.to_string()),
    version: Set(release.version.clone()),
    title: Set(release.title.clone()),
    patchnotes: Set(release.patchnotes.clone()),
    dev_build: Set(release.dev_build),
    checksum: Set(release.checksum.clone()),
    file: Set(release.file.clone()),
    published: Set(release.published),
  }
}

pub(super) fn from_model(model: release::Model) -> (String, registry::Release) {
  let release = registry::Release {
    version: model.version,
    title: model.title,
    patchnotes: model.patchnotes,
    dev_build: model.dev_build,
    checksum: model.checksum,
    file: model.file,
    published: model.published,
  };
  (model.key, release)
}

pub(super) async fn upsert<C: ConnectionTrait>(
  conn: &C,
  application_id: i32,
  key: &str,
  release: &registry::Release,
) -> Result<()> {
  release::Entity::insert(active_model(application_id, key, release))
    .on_conflict(
      OnConflict::columns([release::Column::ApplicationId, release::Column::Key])
        .update_columns([
          release::Column::Version,
          release::Column::Title,
          release::Column::Patchnotes,
          release::Column::DevBuild,
          release::Column::Checksum,
          release::Column::File,
          release::Column::Published,
        ])
        .to_owned(),
    )
    .exec(conn)
    .await?;
  Ok(())
}

pub struct Release<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Release<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Inserts or replaces the stored release under `key`.
  pub async fn save(
    &self,
    application_id: i32,
    key: &str,
    release: &registry::Release,
  ) -> Result<()> {
    upsert(self.db, application_id, key, release).await
  }

  pub async fn delete(&self, application_id: i32, key: &str) -> Result<bool> {
    let result = release::Entity::delete_many()
      .filter(release::Column::ApplicationId.eq(application_id))
      .filter(release::Column::Key.eq(key))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected > 0)
  }

  /// Newest first.
  pub async fn by_application(
    &self,
    application_id: i32,
  ) -> Result<Vec<(String, registry::Release)>> {
    let releases = release::Entity::find()
      .filter(release::Column::ApplicationId.eq(application_id))
      .order_by_desc(release::Column::Published)
      .all(self.db)
      .await?;
    Ok(releases.into_iter().map(from_model).collect())
  }
}
