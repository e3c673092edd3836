use std::{collections::HashSet, env, path::PathBuf, str::FromStr};

use teloxide::Bot;
use uuid::Uuid;

use crate::{
  migration::Migrator,
  prelude::*,
  registry::{Application, Registry},
  report::Report,
  sv, utils,
};

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  /// Public base URL used in download links
  pub host_name: String,
  pub releases_directory: PathBuf,
  pub schedule_period: Duration,
  pub report_lifetime: Duration,
  pub max_artifact_size: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      host_name: String::from("http://localhost:3000"),
      releases_directory: PathBuf::from("./releases"),

      schedule_period: Duration::from_secs(15 * 60),
      report_lifetime: Duration::from_secs(3600),
      max_artifact_size: 64 * 1024 * 1024,
    }
  }
}

fn var<T>(name: &str) -> anyhow::Result<Option<T>>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match env::var(name) {
    Ok(raw) if !raw.trim().is_empty() => raw
      .trim()
      .parse()
      .map(Some)
      .with_context(|| format!("Invalid value for {name}: `{raw}`")),
    _ => Ok(None),
  }
}

fn duration_var(name: &str) -> anyhow::Result<Option<Duration>> {
  var::<humantime::Duration>(name).map(|d| d.map(Into::into))
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();
    let port = var("PORT")?.unwrap_or(default.port);

    Ok(Self {
      port,
      host_name: var("HOST_NAME")?
        .unwrap_or_else(|| format!("http://localhost:{port}")),
      releases_directory: var("RELEASES_DIRECTORY")?
        .unwrap_or(default.releases_directory),
      schedule_period: duration_var("SCHEDULE_PERIOD")?
        .unwrap_or(default.schedule_period),
      report_lifetime: duration_var("REPORT_LIFETIME")?
        .unwrap_or(default.report_lifetime),
      max_artifact_size: var("MAX_ARTIFACT_SIZE")?
        .unwrap_or(default.max_artifact_size),
    })
  }
}

pub fn parse_admins(raw: &str) -> anyhow::Result<HashSet<i64>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .map(|id| id.parse().with_context(|| format!("Invalid admin id `{id}`")))
    .collect()
}

pub struct Services<'a> {
  pub application: sv::Application<'a>,
  pub release: sv::Release<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub bot: Bot,
  pub registry: Registry,
  pub admins: HashSet<i64>,
  pub reports: DashMap<Uuid, Report>,
  pub config: Config,
}

impl AppState {
  /// Connects to the store, migrates it and loads the registry.
  pub async fn new(
    db_url: &str,
    bot_token: &str,
    admins: HashSet<i64>,
    config: Config,
  ) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(db_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let registry = sv::Application::new(&db)
      .load()
      .await
      .context("Failed to load applications")?;
    info!("Loaded {} applications", registry.len());

    Ok(Self {
      db,
      bot: Bot::new(bot_token),
      registry,
      admins,
      reports: DashMap::new(),
      config,
    })
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      application: sv::Application::new(&self.db),
      release: sv::Release::new(&self.db),
    }
  }

  pub fn is_admin(&self, user: i64) -> bool {
    self.admins.contains(&user)
  }

  /// Owners and admins may manage an application.
  pub fn authorize(&self, app: &Application, user: i64) -> Result<()> {
    if app.is_owner(user) || self.is_admin(user) {
      Ok(())
    } else {
      Err(Error::Forbidden)
    }
  }

  pub fn release_dir(&self, application_id: i32, version: &str) -> PathBuf {
    self
      .config
      .releases_directory
      .join(application_id.to_string())
      .join(utils::path_segment(version))
  }

  /// Writes the whole registry to the store.
  pub async fn flush(&self) -> Result<()> {
    self.sv().application.flush(&self.registry).await
  }

  pub fn gc_reports(&self) {
    let now = Utc::now().naive_utc();
    let lifetime = self.config.report_lifetime;
    self.reports.retain(|_, report| !report.is_expired(now, lifetime));
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  /// In-memory state; the bot never talks to Telegram in tests.
  pub async fn state(config: Config) -> AppState {
    AppState::new("sqlite::memory:", "0:test", HashSet::from([1]), config)
      .await
      .unwrap()
  }

  #[test]
  fn test_parse_admins() {
    assert_eq!(parse_admins(" 1, 2,,3 ").unwrap(), HashSet::from([1, 2, 3]));
    assert!(parse_admins("").unwrap().is_empty());
    assert!(parse_admins("1,x").is_err());
  }

  #[tokio::test]
  async fn test_authorize() {
    let app = state(Config::default()).await;
    let application = app
      .registry
      .create(crate::registry::NewApplication {
        id: 1,
        identifier: "app".into(),
        display_name: "App".into(),
        description: String::new(),
        alias: vec![],
        owner: 5,
        channel: None,
      })
      .unwrap();

    assert!(app.authorize(&application, 5).is_ok());
    assert!(app.authorize(&application, 1).is_ok());
    assert!(matches!(app.authorize(&application, 9), Err(Error::Forbidden)));
  }

  #[tokio::test]
  async fn test_gc_reports() {
    let app = state(Config {
      report_lifetime: Duration::from_secs(60),
      ..Config::default()
    })
    .await;

    let meta = crate::report::ServerMetaData {
      version: "1.20".into(),
      current_players: 0,
      loaded_worlds: vec![],
      plugins: vec![],
    };
    let mut stale = Report::new(meta.clone());
    stale.received -= TimeDelta::minutes(5);

    app.reports.insert(Uuid::new_v4(), stale);
    app.reports.insert(Uuid::new_v4(), Report::new(meta));
    app.gc_reports();

    assert_eq!(app.reports.len(), 1);
  }

  #[tokio::test]
  async fn test_release_dir_is_sanitized() {
    let app = state(Config::default()).await;
    let dir = app.release_dir(3, "../1.0 beta");
    assert_eq!(dir, PathBuf::from("./releases/3/_1.0_beta"));
  }
}
