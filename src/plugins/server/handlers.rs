use std::{io::ErrorKind, sync::Arc};

use axum::{
  Json,
  body::Body,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{
  plugins::telegram,
  prelude::*,
  registry::{Application, LATEST, Release},
  report::{self, PluginReport, Report, ServerMetaData},
  state::AppState,
};

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Serialize)]
pub struct ReleaseView {
  pub application: i32,
  pub identifier: String,
  #[serde(flatten)]
  pub release: Release,
  pub download: String,
}

impl ReleaseView {
  fn new(app: &AppState, application: &Application, release: Release) -> Self {
    let download = utils::download_url(
      &app.config.host_name,
      application.id(),
      &release.version,
    );
    Self {
      application: application.id(),
      identifier: application.identifier(),
      release,
      download,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
  pub id: i32,
  pub version: String,
}

pub async fn download(
  State(app): State<Arc<AppState>>,
  Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse> {
  let application = app.registry.by_id(query.id)?;
  let release = application.release(&query.version)?;

  let path = app
    .release_dir(application.id(), &release.version)
    .join(&release.file);

  let file = match tokio::fs::File::open(&path).await {
    Ok(file) => file,
    Err(err) if err.kind() == ErrorKind::NotFound => {
      warn!("Artifact of {} missing at {}", release.version, path.display());
      return Err(Missing::Release(query.version).into());
    }
    Err(err) => return Err(err.into()),
  };

  info!(
    "Serving #{} {} ({})",
    application.id(),
    release.version,
    release.file
  );

  let headers = [
    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
    (
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{}\"", release.file),
    ),
    (header::HeaderName::from_static("x-checksum-sha256"), release.checksum),
  ];

  Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
  #[serde(default)]
  pub dev: bool,
}

pub async fn latest(
  State(app): State<Arc<AppState>>,
  Path(key): Path<String>,
  Query(query): Query<ChannelQuery>,
) -> Result<Json<ReleaseView>> {
  let application = app.registry.resolve(&key)?;
  let release = if query.dev {
    application.latest_version()
  } else {
    application.latest_stable_version()
  }
  .ok_or_else(|| Missing::Release(LATEST.to_string()))?;

  Ok(Json(ReleaseView::new(&app, &application, release)))
}

pub async fn releases(
  State(app): State<Arc<AppState>>,
  Path(key): Path<String>,
  Query(query): Query<ChannelQuery>,
) -> Result<Json<Vec<ReleaseView>>> {
  let application = app.registry.resolve(&key)?;
  let releases = application
    .releases(query.dev)
    .into_iter()
    .map(|release| ReleaseView::new(&app, &application, release))
    .collect();

  Ok(Json(releases))
}

#[derive(Debug, Deserialize)]
pub struct PublishReq {
  pub version: String,
  pub title: String,
  #[serde(default)]
  pub patchnotes: String,
  #[serde(default)]
  pub dev_build: bool,
  pub file_name: String,
  /// Base64 encoded artifact
  pub artifact: String,
  /// Required to replace a published stable release
  #[serde(default)]
  pub overwrite: bool,
}

/// Release ingestion, authenticated by the application's webhook secret.
pub async fn publish(
  State(app): State<Arc<AppState>>,
  Path(token): Path<String>,
  Json(req): Json<PublishReq>,
) -> Result<(StatusCode, Json<ReleaseView>)> {
  let application = app.registry.by_webhook(&token)?;

  let version = req.version.trim();
  if version.is_empty() || req.file_name.trim().is_empty() {
    return Err(Error::InvalidArgs(
      "version and file_name are required".into(),
    ));
  }
  // Underscores stand in for spaces in download links.
  if version.contains('_') || version.eq_ignore_ascii_case(LATEST) {
    return Err(Error::InvalidArgs(format!(
      "version `{version}` is reserved or contains `_`"
    )));
  }
  let key = application
    .release_key(version)
    .unwrap_or_else(|| version.to_string());

  if let Some(existing) = application.release_by_key(&key)
    && existing.is_stable()
    && !req.overwrite
  {
    warn!(
      "Refusing to replace stable release {} of #{} without overwrite",
      key,
      application.id()
    );
    return Err(Error::Conflict(key));
  }

  let artifact =
    BASE64_STANDARD.decode(req.artifact.as_bytes()).map_err(|err| {
      Error::InvalidArgs(format!("artifact is not base64: {err}"))
    })?;
  if artifact.len() > app.config.max_artifact_size {
    return Err(Error::PayloadTooLarge(app.config.max_artifact_size));
  }

  let checksum = format!("{:x}", Sha256::digest(&artifact));
  let file = utils::path_segment(req.file_name.trim());

  let dir = app.release_dir(application.id(), &key);
  let staged = dir.join(format!("{file}.part"));
  tokio::fs::create_dir_all(&dir).await?;
  tokio::fs::write(&staged, &artifact).await?;

  let release = Release::new(
    key.clone(),
    req.title,
    req.patchnotes,
    req.dev_build,
    checksum,
    file.clone(),
  );

  let previous = application.add_release(key.clone(), release.clone());
  if let Err(err) =
    app.sv().release.save(application.id(), &key, &release).await
  {
    match previous {
      Some(previous) => {
        application.add_release(key.clone(), previous);
      }
      None => {
        application.delete_release(&key);
      }
    }
    if let Err(err) = tokio::fs::remove_file(&staged).await {
      warn!("Failed to remove staged {}: {err}", staged.display());
    }
    error!("Failed to store release {} of #{}", key, application.id());
    return Err(err);
  }
  tokio::fs::rename(&staged, dir.join(&file)).await?;

  if previous.is_some() {
    info!("Replaced release {} of #{}", key, application.id());
  }

  info!(
    "Published #{} {} ({} bytes, {})",
    application.id(),
    key,
    artifact.len(),
    if release.dev_build { "dev" } else { "stable" }
  );

  telegram::announce(&app, &application, &release).await;

  let view = ReleaseView::new(&app, &application, release);
  Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Serialize)]
pub struct ReportCreated {
  pub id: Uuid,
}

pub async fn submit_report(
  State(app): State<Arc<AppState>>,
  Json(meta): Json<ServerMetaData>,
) -> (StatusCode, Json<ReportCreated>) {
  let id = Uuid::new_v4();
  debug!("Report {id}: {} plugins", meta.plugins.len());
  app.reports.insert(id, Report::new(meta));

  (StatusCode::CREATED, Json(ReportCreated { id }))
}

#[derive(Debug, Serialize)]
pub struct ReportView {
  #[serde(flatten)]
  pub report: Report,
  pub plugins: Vec<PluginReport>,
}

pub async fn report(
  State(app): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ReportView>> {
  let report = app
    .reports
    .get(&id)
    .map(|entry| entry.value().clone())
    .ok_or_else(|| Missing::Report(id.to_string()))?;
  let plugins = report::cross_reference(&app.registry, &report.meta);

  Ok(Json(ReportView { report, plugins }))
}

#[cfg(test)]
mod tests {
  use axum::{
    Router,
    http::{Request, Response},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    plugins::server::router,
    registry::NewApplication,
    state::{Config, tests::state},
  };

  struct Harness {
    app: Arc<AppState>,
    router: Router,
    _dir: tempfile::TempDir,
  }

  async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
      releases_directory: dir.path().to_path_buf(),
      host_name: "https://dl.example.org".into(),
      max_artifact_size: 1024,
      ..Config::default()
    };
    let app = Arc::new(state(config).await);
    let application = app
      .registry
      .create(NewApplication {
        id: 1,
        identifier: "bloodnight".into(),
        display_name: "Blood Night".into(),
        description: String::new(),
        alias: vec!["bn".into()],
        owner: 10,
        channel: None,
      })
      .unwrap();
    app.sv().application.save(&application).await.unwrap();

    Harness { router: router(app.clone()), app, _dir: dir }
  }

  async fn body_json(response: Response<Body>) -> json::Value {
    let bytes =
      axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    json::from_slice(&bytes).unwrap()
  }

  fn publish_req(token: &str, body: json::Value) -> Request<Body> {
    Request::post(format!("/api/webhook/{token}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn payload(version: &str, dev: bool, content: &[u8]) -> json::Value {
    json::json!({
      "version": version,
      "title": format!("Release {version}"),
      "patchnotes": "Fixed things",
      "dev_build": dev,
      "file_name": "BloodNight.jar",
      "artifact": BASE64_STANDARD.encode(content),
    })
  }

  fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
  }

  #[tokio::test]
  async fn test_publish_then_download() {
    let h = harness().await;
    let token = h.app.registry.by_id(1).unwrap().webhook().to_string();

    let response = h
      .router
      .clone()
      .oneshot(publish_req(&token, payload("1.0 beta", false, b"jar bytes")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let expected = format!("{:x}", Sha256::digest(b"jar bytes"));
    let body = body_json(response).await;
    assert_eq!(body["checksum"], expected.as_str());
    assert_eq!(
      body["download"],
      "https://dl.example.org/download?id=1&version=1.0_beta"
    );

    let response = h
      .router
      .clone()
      .oneshot(get("/download?id=1&version=1.0_BETA"))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-checksum-sha256"], expected.as_str());
    let bytes =
      axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"jar bytes");

    let stored = h.app.sv().release.by_application(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "1.0 beta");
  }

  #[tokio::test]
  async fn test_publish_rejects_bad_token() {
    let h = harness().await;
    let response = h
      .router
      .oneshot(publish_req("nope", payload("1.0", false, b"x")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn test_publish_requires_overwrite_for_stable() {
    let h = harness().await;
    let token = h.app.registry.by_id(1).unwrap().webhook().to_string();

    for (body, status) in [
      (payload("1.0", true, b"dev"), StatusCode::CREATED),
      (payload("1.0", false, b"stable"), StatusCode::CREATED),
      (payload("1.0", false, b"again"), StatusCode::CONFLICT),
    ] {
      let response =
        h.router.clone().oneshot(publish_req(&token, body)).await.unwrap();
      assert_eq!(response.status(), status);
    }

    let mut body = payload("1.0", false, b"again");
    body["overwrite"] = json::Value::Bool(true);
    let response =
      h.router.clone().oneshot(publish_req(&token, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let release = h.app.registry.by_id(1).unwrap().release("1.0").unwrap();
    assert_eq!(release.checksum, format!("{:x}", Sha256::digest(b"again")));
  }

  #[tokio::test]
  async fn test_publish_overwrite_check_ignores_case() {
    let h = harness().await;
    let token = h.app.registry.by_id(1).unwrap().webhook().to_string();

    for (body, status) in [
      (payload("1.0-RC", false, b"first"), StatusCode::CREATED),
      (payload("1.0-rc", false, b"second"), StatusCode::CONFLICT),
    ] {
      let response =
        h.router.clone().oneshot(publish_req(&token, body)).await.unwrap();
      assert_eq!(response.status(), status);
    }

    let mut body = payload("1.0-rc", false, b"second");
    body["overwrite"] = json::Value::Bool(true);
    let response =
      h.router.clone().oneshot(publish_req(&token, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["version"], "1.0-RC");

    let application = h.app.registry.by_id(1).unwrap();
    let entries = application.release_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "1.0-RC");
    assert_eq!(
      entries[0].1.checksum,
      format!("{:x}", Sha256::digest(b"second"))
    );

    let stored = h.app.sv().release.by_application(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "1.0-RC");
  }

  #[tokio::test]
  async fn test_publish_rejects_reserved_versions() {
    let h = harness().await;
    let token = h.app.registry.by_id(1).unwrap().webhook().to_string();

    for version in ["1.0_beta", "latest", "LATEST"] {
      let response = h
        .router
        .clone()
        .oneshot(publish_req(&token, payload(version, false, b"x")))
        .await
        .unwrap();
      assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{version}");
    }
    assert!(h.app.registry.by_id(1).unwrap().latest_version().is_none());
  }

  #[tokio::test]
  async fn test_publish_rolls_back_when_store_fails() {
    let h = harness().await;
    // Never saved, so the release rows violate the foreign key.
    let application = h
      .app
      .registry
      .create(NewApplication {
        id: 2,
        identifier: "orphan".into(),
        display_name: "Orphan".into(),
        description: String::new(),
        alias: vec![],
        owner: 10,
        channel: None,
      })
      .unwrap();
    let token = application.webhook().to_string();

    let old = Release::new("1.0", "", "", false, "old", "BloodNight.jar");
    application.add_release("1.0", old);
    let dir = h.app.release_dir(2, "1.0");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("BloodNight.jar"), b"old").await.unwrap();

    let mut body = payload("1.0", false, b"new");
    body["overwrite"] = json::Value::Bool(true);
    let response =
      h.router.clone().oneshot(publish_req(&token, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(application.release("1.0").unwrap().checksum, "old");
    let content = tokio::fs::read(dir.join("BloodNight.jar")).await.unwrap();
    assert_eq!(content, b"old");
    assert!(!dir.join("BloodNight.jar.part").exists());

    let response = h
      .router
      .clone()
      .oneshot(publish_req(&token, payload("2.0", false, b"new")))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(application.release_by_key("2.0").is_none());
    let dir = h.app.release_dir(2, "2.0");
    assert!(!dir.join("BloodNight.jar").exists());
    assert!(!dir.join("BloodNight.jar.part").exists());
  }

  #[tokio::test]
  async fn test_publish_enforces_size_limit() {
    let h = harness().await;
    let token = h.app.registry.by_id(1).unwrap().webhook().to_string();

    let response = h
      .router
      .oneshot(publish_req(&token, payload("1.0", false, &[0u8; 2048])))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(h.app.registry.by_id(1).unwrap().latest_version().is_none());
  }

  #[tokio::test]
  async fn test_latest_and_releases() {
    let h = harness().await;
    let application = h.app.registry.by_id(1).unwrap();

    let response = h
      .router
      .clone()
      .oneshot(get("/api/applications/bn/latest"))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stable = Release::new("1.0", "", "", false, "a", "f");
    let dev = Release::new("1.1", "", "", true, "b", "f");
    application.add_release("1.0", stable);
    application.add_release("1.1", dev);

    let stable = body_json(
      h.router
        .clone()
        .oneshot(get("/api/applications/BN/latest"))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(stable["version"], "1.0");

    let dev = body_json(
      h.router
        .clone()
        .oneshot(get("/api/applications/bloodnight/latest?dev=true"))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(dev["version"], "1.1");

    let all = body_json(
      h.router
        .clone()
        .oneshot(get("/api/applications/bn/releases?dev=true"))
        .await
        .unwrap(),
    )
    .await;
    let versions: Vec<_> = all
      .as_array()
      .unwrap()
      .iter()
      .map(|r| r["version"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(versions, ["1.1", "1.0"]);
  }

  #[tokio::test]
  async fn test_download_unknown() {
    let h = harness().await;

    let response = h
      .router
      .clone()
      .oneshot(get("/download?id=9&version=latest"))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response =
      h.router.oneshot(get("/download?id=1&version=latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_debug_report_round_trip() {
    let h = harness().await;

    let meta = json::json!({
      "version": "git-Paper-1.20.4",
      "currentPlayers": 2,
      "loadedWorlds": ["world"],
      "plugins": [{ "name": "BN", "version": "1.0", "enabled": true }]
    });
    let response = h
      .router
      .clone()
      .oneshot(
        Request::post("/api/debug")
          .header(header::CONTENT_TYPE, "application/json")
          .body(Body::from(meta.to_string()))
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let view = body_json(
      h.router.oneshot(get(&format!("/api/debug/{id}"))).await.unwrap(),
    )
    .await;
    assert_eq!(view["meta"]["currentPlayers"], 2);
    assert_eq!(view["plugins"][0]["status"], "unreleased");
  }
}
