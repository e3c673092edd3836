//! Update Butler - release distribution registry
//!
//! Architecture:
//! - In-memory registry of applications and their releases
//! - SeaORM write-through persistence (SQLite)
//! - Axum for downloads, webhook publishing and server reports
//! - Teloxide for the management bot and release announcements

mod entity;
mod error;
mod migration;
mod plugins;
mod prelude;
mod registry;
mod report;
mod state;
mod sv;
mod utils;

use std::{env, sync::Arc};

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, schedule, server, telegram},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "butler=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let admins =
    state::parse_admins(&env::var("ADMIN_IDS").unwrap_or_default())?;
  if admins.is_empty() {
    warn!("No admins configured, nobody can create applications");
  }

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:butler.db?mode=rwc".into());
  let token = env::var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN not set")?;
  let config = Config::from_env()?;

  info!("Starting Update Butler v{}", env!("CARGO_PKG_VERSION"));

  let app = Arc::new(AppState::new(&db_url, &token, admins, config).await?);

  let handles = App::new()
    .register(server::Plugin)
    .register(telegram::Plugin)
    .register(schedule::Plugin)
    .run(app.clone());

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down...");

  for handle in handles {
    handle.abort();
  }

  app.flush().await.context("Final registry flush failed")?;
  info!("Registry flushed, bye");

  Ok(())
}
