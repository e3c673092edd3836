//! Server reports submitted by client plugins.
//!
//! A report is read-only input: it is matched against the registry so
//! operators can see which installed plugins lag behind their latest release.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{prelude::*, registry::Registry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMetaData {
  pub name: String,
  pub version: String,
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub authors: Vec<String>,
  #[serde(default)]
  pub depends: Vec<String>,
}

impl PluginMetaData {
  fn write_indented(
    &self,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
  ) -> fmt::Result {
    let pad = " ".repeat(indent);
    write!(
      f,
      "{pad}{} {} ({})",
      self.name,
      self.version,
      if self.enabled { "enabled" } else { "disabled" }
    )?;
    if !self.authors.is_empty() {
      write!(f, " by {}", self.authors.join(", "))?;
    }
    if !self.depends.is_empty() {
      write!(f, " depends on [{}]", self.depends.join(", "))?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetaData {
  /// Server engine version string
  pub version: String,
  pub current_players: u32,
  #[serde(default)]
  pub loaded_worlds: Vec<String>,
  #[serde(default)]
  pub plugins: Vec<PluginMetaData>,
}

impl fmt::Display for ServerMetaData {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "version: {}", self.version)?;
    writeln!(f, "currentPlayers: {}", self.current_players)?;
    writeln!(f, "loadedWorlds: [{}]", self.loaded_worlds.join(", "))?;
    writeln!(f, "pluginCount: {}", self.plugins.len())?;
    write!(f, "plugins:")?;
    for plugin in &self.plugins {
      writeln!(f)?;
      plugin.write_indented(f, 2)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PluginStatus {
  Current { application: i32 },
  Outdated { application: i32, latest: String },
  /// Known application without any release.
  Unreleased { application: i32 },
  /// No application answers to the plugin name.
  Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginReport {
  pub name: String,
  pub installed: String,
  #[serde(flatten)]
  pub status: PluginStatus,
}

/// Compares each installed plugin with its latest stable release, or the
/// latest release when no stable one exists.
pub fn cross_reference(
  registry: &Registry,
  meta: &ServerMetaData,
) -> Vec<PluginReport> {
  meta
    .plugins
    .iter()
    .map(|plugin| {
      let status = match registry.resolve(&plugin.name) {
        Err(_) => PluginStatus::Unknown,
        Ok(app) => {
          let application = app.id();
          match app.preferred_version() {
            None => PluginStatus::Unreleased { application },
            Some(latest)
              if latest.version.eq_ignore_ascii_case(&plugin.version) =>
            {
              PluginStatus::Current { application }
            }
            Some(latest) => {
              PluginStatus::Outdated { application, latest: latest.version }
            }
          }
        }
      };

      PluginReport {
        name: plugin.name.clone(),
        installed: plugin.version.clone(),
        status,
      }
    })
    .collect()
}

/// A stored submission, kept for a limited time.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
  pub received: DateTime,
  pub meta: ServerMetaData,
}

impl Report {
  pub fn new(meta: ServerMetaData) -> Self {
    Self { received: Utc::now().naive_utc(), meta }
  }

  pub fn is_expired(&self, now: DateTime, lifetime: Duration) -> bool {
    TimeDelta::from_std(lifetime)
      .map(|lifetime| now - self.received >= lifetime)
      .unwrap_or(false)
  }
}
