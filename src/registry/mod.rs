//! In-memory application registry.
//!
//! Applications are shared as `Arc<Application>`; each one guards its own
//! fields and releases with a `RwLock`. The registry map has its own lock,
//! always taken before any application lock. Nothing here logs or performs
//! I/O: persistence and notification happen in the callers after a mutation
//! has succeeded.

mod application;
mod release;

use std::{
  collections::BTreeMap,
  sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

pub use application::{Application, ApplicationInfo, NewApplication};
pub use release::{LATEST, Release, Releases};

use crate::prelude::*;

type Apps = BTreeMap<i32, Arc<Application>>;

#[derive(Debug, Default)]
pub struct Registry {
  apps: RwLock<Apps>,
}

fn check_name(name: &str) -> Result<()> {
  if name.is_empty() || name.chars().any(char::is_whitespace) {
    return Err(Error::InvalidArgs(format!(
      "`{name}` is not a valid identifier: it must be non-empty and contain \
       no whitespace"
    )));
  }
  Ok(())
}

/// Validates aliases, dropping case-insensitive duplicates and the
/// application's own identifier.
fn normalize_alias(
  identifier: &str,
  alias: Vec<String>,
) -> Result<Vec<String>> {
  let mut seen = vec![identifier.to_lowercase()];
  let mut out = Vec::with_capacity(alias.len());

  for name in alias {
    check_name(&name)?;
    let folded = name.to_lowercase();
    if !seen.contains(&folded) {
      seen.push(folded);
      out.push(name);
    }
  }
  Ok(out)
}

/// First of `names` already used by an application other than `except`.
fn taken<'a>(
  apps: &Apps,
  names: impl IntoIterator<Item = &'a String>,
  except: Option<i32>,
) -> Option<String> {
  let used: Vec<String> = apps
    .values()
    .filter(|app| Some(app.id()) != except)
    .flat_map(|app| app.names())
    .collect();

  names.into_iter().find(|name| used.contains(&name.to_lowercase())).cloned()
}

fn entry(apps: &Apps, id: i32) -> Result<&Arc<Application>> {
  apps
    .get(&id)
    .ok_or_else(|| Error::NotFound(Missing::Application(format!("#{id}"))))
}

fn validate(mut new: NewApplication) -> Result<NewApplication> {
  check_name(&new.identifier)?;
  new.alias = normalize_alias(&new.identifier, new.alias)?;
  Ok(new)
}

fn next_id(apps: &Apps) -> i32 {
  apps.keys().next_back().map_or(1, |id| id + 1)
}

fn insert(apps: &mut Apps, app: Application) -> Result<Arc<Application>> {
  if apps.contains_key(&app.id()) {
    return Err(Error::Conflict(format!("#{}", app.id())));
  }
  let info = app.info();
  let names = std::iter::once(&info.identifier).chain(info.alias.iter());
  if let Some(name) = taken(apps, names, None) {
    return Err(Error::Conflict(name));
  }

  let app = Arc::new(app);
  apps.insert(app.id(), app.clone());
  Ok(app)
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, Apps> {
    self.apps.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Apps> {
    self.apps.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Builds a registry from stored applications, enforcing uniqueness.
  pub fn from_applications(
    apps: impl IntoIterator<Item = Application>,
  ) -> Result<Self> {
    let registry = Self::new();
    {
      let mut map = registry.write();
      for app in apps {
        insert(&mut map, app)?;
      }
    }
    Ok(registry)
  }

  /// Registers a new application under `new.id` and generates its webhook
  /// secret.
  pub fn create(&self, new: NewApplication) -> Result<Arc<Application>> {
    let new = validate(new)?;
    insert(&mut self.write(), Application::new(new))
  }

  /// Like [`Self::create`], but ignores `new.id` and assigns the next free
  /// id while holding the registry lock.
  pub fn create_next(&self, new: NewApplication) -> Result<Arc<Application>> {
    let mut new = validate(new)?;
    let mut apps = self.write();
    new.id = next_id(&apps);
    insert(&mut apps, Application::new(new))
  }

  /// Identifier match first, then aliases; both case-insensitive.
  pub fn resolve(&self, key: &str) -> Result<Arc<Application>> {
    let folded = key.to_lowercase();
    let apps = self.read();

    apps
      .values()
      .find(|app| app.identifier_is(&folded))
      .or_else(|| apps.values().find(|app| app.alias_is(&folded)))
      .cloned()
      .ok_or_else(|| Error::NotFound(Missing::Application(key.to_string())))
  }

  pub fn by_id(&self, id: i32) -> Result<Arc<Application>> {
    entry(&self.read(), id).cloned()
  }

  pub fn by_webhook(&self, token: &str) -> Result<Arc<Application>> {
    self
      .read()
      .values()
      .find(|app| app.webhook() == token)
      .cloned()
      .ok_or(Error::Unauthorized)
  }

  /// Removes the application together with its releases.
  pub fn delete(&self, id: i32) -> Result<Arc<Application>> {
    self
      .write()
      .remove(&id)
      .ok_or_else(|| Error::NotFound(Missing::Application(format!("#{id}"))))
  }

  /// Ordered by id.
  pub fn all(&self) -> Vec<Arc<Application>> {
    self.read().values().cloned().collect()
  }

  pub fn owned_by(&self, principal: i64) -> Vec<Arc<Application>> {
    let apps = self.read();
    apps.values().filter(|app| app.is_owner(principal)).cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  pub fn rename(&self, id: i32, identifier: impl Into<String>) -> Result<()> {
    let identifier = identifier.into();
    check_name(&identifier)?;

    let apps = self.write();
    let app = entry(&apps, id)?;

    if let Some(name) = taken(&apps, [&identifier], Some(id)) {
      return Err(Error::Conflict(name));
    }

    let info = app.info();
    let alias = info
      .alias
      .into_iter()
      .filter(|a| a.to_lowercase() != identifier.to_lowercase())
      .collect();
    app.set_identifier(identifier);
    app.set_alias(alias);
    Ok(())
  }

  /// Replaces all aliases; returns the stored list.
  pub fn set_aliases(
    &self,
    id: i32,
    alias: Vec<String>,
  ) -> Result<Vec<String>> {
    let apps = self.write();
    let app = entry(&apps, id)?;

    let alias = normalize_alias(&app.identifier(), alias)?;
    if let Some(name) = taken(&apps, &alias, Some(id)) {
      return Err(Error::Conflict(name));
    }

    app.set_alias(alias.clone());
    Ok(alias)
  }

  /// `false` if the application already answers to `alias`.
  pub fn add_alias(&self, id: i32, alias: impl Into<String>) -> Result<bool> {
    let alias = alias.into();
    check_name(&alias)?;

    let apps = self.write();
    let app = entry(&apps, id)?;

    if app.names().contains(&alias.to_lowercase()) {
      return Ok(false);
    }
    if let Some(name) = taken(&apps, [&alias], Some(id)) {
      return Err(Error::Conflict(name));
    }

    let mut current = app.info().alias;
    current.push(alias);
    app.set_alias(current);
    Ok(true)
  }

  /// Case-insensitive; `false` if no such alias existed.
  pub fn remove_alias(&self, id: i32, alias: &str) -> Result<bool> {
    let folded = alias.to_lowercase();
    let apps = self.write();
    let app = entry(&apps, id)?;

    let mut current = app.info().alias;
    let before = current.len();
    current.retain(|a| a.to_lowercase() != folded);
    let removed = current.len() < before;
    app.set_alias(current);
    Ok(removed)
  }
}
