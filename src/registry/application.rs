use std::{
  collections::HashSet,
  sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{Release, Releases};
use crate::prelude::*;

/// Arguments of [`super::Registry::create`].
#[derive(Debug, Clone)]
pub struct NewApplication {
  pub id: i32,
  pub identifier: String,
  pub display_name: String,
  pub description: String,
  pub alias: Vec<String>,
  pub owner: i64,
  pub channel: Option<i64>,
}

/// Owned copy of everything but the releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationInfo {
  pub id: i32,
  pub identifier: String,
  pub display_name: String,
  pub description: String,
  pub alias: Vec<String>,
  /// Sorted ascending.
  pub owner: Vec<i64>,
  pub channel: Option<i64>,
}

#[derive(Debug)]
struct Inner {
  identifier: String,
  display_name: String,
  description: String,
  alias: Vec<String>,
  owner: HashSet<i64>,
  channel: Option<i64>,
  releases: Releases,
}

#[derive(Debug)]
pub struct Application {
  id: i32,
  webhook: String,
  inner: RwLock<Inner>,
}

fn webhook_secret(display_name: &str) -> String {
  let seed = format!("{}{}", display_name, Utc::now().timestamp_millis());
  format!("{:x}", Sha256::digest(seed.as_bytes()))
}

impl Application {
  pub(super) fn new(new: NewApplication) -> Self {
    let webhook = webhook_secret(&new.display_name);
    Self {
      id: new.id,
      webhook,
      inner: RwLock::new(Inner {
        identifier: new.identifier,
        display_name: new.display_name,
        description: new.description,
        alias: new.alias,
        owner: HashSet::from([new.owner]),
        channel: new.channel,
        releases: Releases::new(),
      }),
    }
  }

  /// Rebuilds a stored application, keeping its webhook secret.
  pub fn restore(
    info: ApplicationInfo,
    webhook: String,
    releases: Releases,
  ) -> Self {
    Self {
      id: info.id,
      webhook,
      inner: RwLock::new(Inner {
        identifier: info.identifier,
        display_name: info.display_name,
        description: info.description,
        alias: info.alias,
        owner: info.owner.into_iter().collect(),
        channel: info.channel,
        releases,
      }),
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, Inner> {
    self.inner.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Inner> {
    self.inner.write().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn id(&self) -> i32 {
    self.id
  }

  pub fn webhook(&self) -> &str {
    &self.webhook
  }

  pub fn identifier(&self) -> String {
    self.read().identifier.clone()
  }

  pub fn display_name(&self) -> String {
    self.read().display_name.clone()
  }

  pub fn channel(&self) -> Option<i64> {
    self.read().channel
  }

  pub fn info(&self) -> ApplicationInfo {
    let inner = self.read();
    let mut owner: Vec<_> = inner.owner.iter().copied().collect();
    owner.sort_unstable();

    ApplicationInfo {
      id: self.id,
      identifier: inner.identifier.clone(),
      display_name: inner.display_name.clone(),
      description: inner.description.clone(),
      alias: inner.alias.clone(),
      owner,
      channel: inner.channel,
    }
  }

  /// Lower-cased identifier followed by lower-cased aliases.
  pub(super) fn names(&self) -> Vec<String> {
    let inner = self.read();
    std::iter::once(&inner.identifier)
      .chain(inner.alias.iter())
      .map(|name| name.to_lowercase())
      .collect()
  }

  pub(super) fn identifier_is(&self, folded: &str) -> bool {
    self.read().identifier.to_lowercase() == folded
  }

  pub(super) fn alias_is(&self, folded: &str) -> bool {
    self.read().alias.iter().any(|a| a.to_lowercase() == folded)
  }

  pub(super) fn set_identifier(&self, identifier: String) {
    self.write().identifier = identifier;
  }

  pub(super) fn set_alias(&self, alias: Vec<String>) {
    self.write().alias = alias;
  }

  pub fn set_display_name(&self, display_name: impl Into<String>) {
    self.write().display_name = display_name.into();
  }

  pub fn set_description(&self, description: impl Into<String>) {
    self.write().description = description.into();
  }

  pub fn set_channel(&self, channel: Option<i64>) {
    self.write().channel = channel;
  }

  pub fn is_owner(&self, principal: i64) -> bool {
    self.read().owner.contains(&principal)
  }

  /// `true` if the principal was not an owner before.
  pub fn add_owner(&self, principal: i64) -> bool {
    self.write().owner.insert(principal)
  }

  /// `true` if the principal was an owner. The last owner may be removed.
  pub fn remove_owner(&self, principal: i64) -> bool {
    self.write().owner.remove(&principal)
  }

  /// Last write wins; returns the replaced release, if any.
  pub fn add_release(
    &self,
    key: impl Into<String>,
    release: Release,
  ) -> Option<Release> {
    self.write().releases.add(key, release)
  }

  pub fn release(&self, key: &str) -> Result<Release> {
    self.read().releases.get(key).cloned()
  }

  pub fn release_by_key(&self, key: &str) -> Option<Release> {
    self.read().releases.by_key(key).cloned()
  }

  /// Stored key a lookup of `version` lands on, if any.
  pub fn release_key(&self, version: &str) -> Option<String> {
    self.read().releases.find_key(version).cloned()
  }

  pub fn delete_release(&self, key: &str) -> bool {
    self.write().releases.delete(key)
  }

  pub fn latest_version(&self) -> Option<Release> {
    self.read().releases.latest().cloned()
  }

  pub fn latest_stable_version(&self) -> Option<Release> {
    self.read().releases.latest_stable().cloned()
  }

  /// Latest stable release, or the latest dev build while nothing is stable.
  pub fn preferred_version(&self) -> Option<Release> {
    let inner = self.read();
    inner.releases.latest_stable().or_else(|| inner.releases.latest()).cloned()
  }

  /// Snapshot, newest first.
  pub fn releases(&self, dev: bool) -> Vec<Release> {
    self.read().releases.list(dev).into_iter().cloned().collect()
  }

  /// Stored key and release pairs.
  pub fn release_entries(&self) -> Vec<(String, Release)> {
    let inner = self.read();
    inner.releases.iter().map(|(k, r)| (k.clone(), r.clone())).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::release::tests::release;

  fn app() -> Application {
    Application::new(NewApplication {
      id: 1,
      identifier: "bloodnight".into(),
      display_name: "Blood Night".into(),
      description: "Nights get darker".into(),
      alias: vec!["bn".into()],
      owner: 100,
      channel: Some(-42),
    })
  }

  #[test]
  fn test_webhook_is_sha256_hex() {
    let app = app();
    assert_eq!(app.webhook().len(), 64);
    assert!(app.webhook().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
  }

  #[test]
  fn test_owners() {
    let app = app();

    assert!(app.is_owner(100));
    assert!(!app.is_owner(200));

    assert!(app.add_owner(200));
    assert!(!app.add_owner(200));
    assert_eq!(app.info().owner, [100, 200]);

    assert!(!app.remove_owner(300));
    assert!(app.remove_owner(100));
    assert!(app.remove_owner(200));
    assert!(app.info().owner.is_empty());
  }

  #[test]
  fn test_release_views_are_snapshots() {
    let app = app();
    let now = Utc::now().naive_utc();
    app.add_release("1.0", release("1.0", false, now));

    let before = app.releases(true);
    app.add_release("1.1", release("1.1", false, now + TimeDelta::seconds(1)));

    assert_eq!(before.len(), 1);
    assert_eq!(app.releases(true).len(), 2);
    assert_eq!(app.latest_stable_version().unwrap().version, "1.1");
  }

  #[test]
  fn test_preferred_version_favors_stable() {
    let app = app();
    let now = Utc::now().naive_utc();
    assert!(app.preferred_version().is_none());

    app.add_release("1.1-dev", release("1.1-dev", true, now));
    assert_eq!(app.preferred_version().unwrap().version, "1.1-dev");

    let older = now - TimeDelta::seconds(60);
    app.add_release("1.0", release("1.0", false, older));
    assert_eq!(app.preferred_version().unwrap().version, "1.0");
    assert_eq!(app.latest_version().unwrap().version, "1.1-dev");
  }

  #[test]
  fn test_release_key_follows_lookup() {
    let app = app();
    let now = Utc::now().naive_utc();
    app.add_release("1.0-RC", release("1.0-RC", false, now));

    assert_eq!(app.release_key("1.0-rc").as_deref(), Some("1.0-RC"));
    assert!(app.release_key("1.0").is_none());
  }

  #[test]
  fn test_restore_keeps_webhook() {
    let original = app();
    let release = Release::new("2.0", "t", "p", false, "ff", "a");
    original.add_release("2.0", release);

    let restored = Application::restore(
      original.info(),
      original.webhook().to_string(),
      original.release_entries().into_iter().collect(),
    );

    assert_eq!(restored.webhook(), original.webhook());
    assert_eq!(restored.info(), original.info());
    assert_eq!(restored.latest_version(), original.latest_version());
  }
}
