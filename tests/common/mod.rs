#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use tower::ServiceExt;

use langpack::{
    assets::DirectoryAssetStore,
    config::Config,
    language::LanguagePackService,
    marketing::MarketingService,
    mirror::{AssetSyncCache, LocalMirror, SyncSettings},
    state::MemoryStateStore,
    web::{AppState, create_router},
};

pub const CONSENT_KEY: &str = "CONSENT-DE";
pub const FEEDBACK_KEY: &str = "FEEDBACK-DE";
pub const TRACKING_KEY: &str = "TRACKING-DE";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Configuration pointing at a local asset directory, a mirror under
/// `work_dir` and, optionally, a mock marketing API
pub fn test_config(asset_dir: &Path, work_dir: &Path, marketing_base: Option<String>) -> Config {
    let mut config = Config::default();
    config.assets.base_url = None;
    config.assets.directory = Some(asset_dir.to_path_buf());
    config.mirror.path = work_dir.join("language");
    config.state.path = work_dir.join("state.json");
    config.marketing.subdomain = "test".to_string();
    config.marketing.client_id = "client".to_string();
    config.marketing.client_secret = "secret".to_string();
    config.marketing.consent_key = CONSENT_KEY.to_string();
    config.marketing.feedback_key = FEEDBACK_KEY.to_string();
    config.marketing.tracking_key = TRACKING_KEY.to_string();
    if let Some(base) = marketing_base {
        config.marketing.auth_base_url = Some(base.clone());
        config.marketing.rest_base_url = Some(base);
    }
    config
}

pub fn build_app(config: Config) -> Router {
    let sync = Arc::new(AssetSyncCache::new(
        Arc::new(DirectoryAssetStore::new(
            config.assets.directory.clone().unwrap(),
        )),
        LocalMirror::new(&config.mirror.path),
        SyncSettings::from_config(&config.assets, &config.mirror),
    ));
    let marketing = MarketingService::new(
        &config.marketing,
        &config.tracking,
        Arc::new(MemoryStateStore::new()),
    )
    .unwrap();

    create_router(AppState {
        config: Arc::new(config),
        language: LanguagePackService::new(sync),
        marketing: Arc::new(marketing),
    })
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
    let request_builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request_builder
            .header("content-type", "application/json")
            .header("x-vendor-signature", "sig-1")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request_builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: &str) -> TestResponse {
    send(app, Method::POST, uri, Some(body)).await
}
