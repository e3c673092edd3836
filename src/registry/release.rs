//! Releases of a single application and version resolution.

use std::{
  cmp::Ordering as CmpOrdering,
  sync::atomic::{AtomicI64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Literal key resolving to the newest release, dev builds included.
pub const LATEST: &str = "latest";

static LAST_STAMP: AtomicI64 = AtomicI64::new(i64::MIN);

/// Strictly increasing publish timestamp (microsecond resolution).
pub fn stamp() -> DateTime {
  let now = Utc::now().timestamp_micros();
  let mut last = LAST_STAMP.load(Ordering::Relaxed);
  loop {
    let next = now.max(last.saturating_add(1));
    match LAST_STAMP.compare_exchange_weak(
      last,
      next,
      Ordering::AcqRel,
      Ordering::Relaxed,
    ) {
      Ok(_) => {
        return chrono::DateTime::from_timestamp_micros(next)
          .map(|dt| dt.naive_utc())
          .unwrap_or_else(|| Utc::now().naive_utc());
      }
      Err(actual) => last = actual,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
  pub version: String,
  pub title: String,
  pub patchnotes: String,
  pub dev_build: bool,
  /// Lower-case hex SHA-256 of the artifact.
  pub checksum: String,
  /// Artifact file name inside the release directory.
  pub file: String,
  pub published: DateTime,
}

impl Release {
  pub fn new(
    version: impl Into<String>,
    title: impl Into<String>,
    patchnotes: impl Into<String>,
    dev_build: bool,
    checksum: impl Into<String>,
    file: impl Into<String>,
  ) -> Self {
    Self {
      version: version.into(),
      title: title.into(),
      patchnotes: patchnotes.into(),
      dev_build,
      checksum: checksum.into(),
      file: file.into(),
      published: stamp(),
    }
  }

  pub fn is_stable(&self) -> bool {
    !self.dev_build
  }

  /// Publish time first, the version string breaks ties.
  fn recency(&self, other: &Self) -> CmpOrdering {
    self
      .published
      .cmp(&other.published)
      .then_with(|| self.version.cmp(&other.version))
  }
}

/// Version key to release map owned by one application.
#[derive(Debug, Clone, Default)]
pub struct Releases {
  map: HashMap<String, Release>,
}

impl Releases {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts or replaces the entry for `key`, returning the replaced release.
  pub fn add(
    &mut self,
    key: impl Into<String>,
    release: Release,
  ) -> Option<Release> {
    self.map.insert(key.into(), release)
  }

  /// Exact stored key, without normalization.
  pub fn by_key(&self, key: &str) -> Option<&Release> {
    self.map.get(key)
  }

  /// Stored key answering to `key`: the exact key if present, otherwise the
  /// lexically smallest key equal to it case-insensitively, with underscores
  /// in `key` read as spaces.
  pub fn find_key(&self, key: &str) -> Option<&String> {
    if let Some((stored, _)) = self.map.get_key_value(key) {
      return Some(stored);
    }

    let wanted = key.replace('_', " ").to_lowercase();
    self.map.keys().filter(|stored| stored.to_lowercase() == wanted).min()
  }

  /// Resolves `latest`, otherwise the release under [`Self::find_key`].
  pub fn get(&self, key: &str) -> Result<&Release> {
    let release = if key.eq_ignore_ascii_case(LATEST) {
      self.latest()
    } else {
      self.find_key(key).and_then(|stored| self.map.get(stored))
    };
    release.ok_or_else(|| Error::NotFound(Missing::Release(key.to_string())))
  }

  pub fn delete(&mut self, key: &str) -> bool {
    self.map.remove(key).is_some()
  }

  pub fn latest(&self) -> Option<&Release> {
    self.map.values().max_by(|a, b| a.recency(b))
  }

  pub fn latest_stable(&self) -> Option<&Release> {
    self.map.values().filter(|r| r.is_stable()).max_by(|a, b| a.recency(b))
  }

  /// Newest first.
  pub fn list(&self, dev: bool) -> Vec<&Release> {
    let mut releases: Vec<_> =
      self.map.values().filter(|r| dev || r.is_stable()).collect();
    releases.sort_by(|a, b| b.recency(a));
    releases
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Release)> {
    self.map.iter()
  }
}

impl FromIterator<(String, Release)> for Releases {
  fn from_iter<I: IntoIterator<Item = (String, Release)>>(iter: I) -> Self {
    Self { map: iter.into_iter().collect() }
  }
}
