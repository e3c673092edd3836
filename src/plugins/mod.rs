pub mod schedule;
pub mod server;
pub mod telegram;

use std::{sync::Arc, time::Duration};

use tokio::{
  task::{AbortHandle, JoinHandle},
  time::sleep,
};
use tracing::{error, info, warn};

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

/// Supervises plugins, restarting any that stop or crash.
pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  /// Aborting a returned handle stops its plugin for good.
  pub fn run(self, app: Arc<AppState>) -> Vec<JoinHandle<()>> {
    self
      .plugins
      .into_iter()
      .map(|plugin| {
        let app = app.clone();
        tokio::spawn(supervise(plugin, app))
      })
      .collect()
  }
}

/// Aborts the running plugin task when the supervisor itself is aborted.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
  fn drop(&mut self) {
    self.0.abort();
  }
}

async fn supervise(plugin: Arc<dyn Plugin>, app: Arc<AppState>) {
  let name = plugin.name();
  info!("SYSTEM: Service `{name}` initialized");

  loop {
    let handle = {
      let app = app.clone();
      let plugin = plugin.clone();
      tokio::spawn(async move { plugin.start(app).await })
    };
    let _guard = AbortOnDrop(handle.abort_handle());

    match handle.await {
      Ok(Ok(())) => warn!("Service `{name}` stopped unexpectedly (Ok)."),
      Ok(Err(err)) => error!("Service `{name}` crashed with error: {err:#}."),
      Err(join_err) if join_err.is_cancelled() => {
        info!("Service `{name}` shutdown.");
        break;
      }
      Err(_) => error!("Service `{name}` PANICKED!"),
    }

    sleep(Duration::from_secs(5)).await;
    info!("SYSTEM: Restarting service `{name}`...");
  }
}
