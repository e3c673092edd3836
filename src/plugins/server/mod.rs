mod handlers;

use std::{net::SocketAddr, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

/// Routes without rate limiting, which needs the peer address.
pub fn router(app: Arc<AppState>) -> Router {
  // base64 inflates artifacts by a third, plus room for the metadata
  let publish_limit = app.config.max_artifact_size / 3 * 4 + 64 * 1024;

  Router::new()
    .route("/health", get(handlers::health))
    .route("/download", get(handlers::download))
    .route(
      "/api/webhook/{token}",
      post(handlers::publish).layer(DefaultBodyLimit::max(publish_limit)),
    )
    .route("/api/applications/{key}/latest", get(handlers::latest))
    .route("/api/applications/{key}/releases", get(handlers::releases))
    .route("/api/debug", post(handlers::submit_report))
    .route("/api/debug/{id}", get(handlers::report))
    .layer(TraceLayer::new_for_http())
    .with_state(app)
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let limiter = governor_conf.limiter().clone();
    let port = app.config.port;

    let router = router(app)
      .layer(
        ServiceBuilder::new().layer(GovernorLayer::new(governor_conf)).layer(
          CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP Server listening on {addr}");

    let limiter = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    let server = async {
      axum::serve(listener, router).await.context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
          Ok(_) => info!("Server stopped gracefully"),
          Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = limiter => {
        error!("Rate limiter cleaner stopped unexpectedly!");
        Ok(())
      }
    }
  }
}
