use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use authbroker::oauth::Provider;
use authbroker::persistence::file::DirectoryProvider;
use authbroker::server::flow::FlowEngine;
use authbroker::server::{router, AppState};
use axum::Router;
use tempfile::TempDir;

#[allow(dead_code)]
pub const REDIRECT_URL: &str = "http://localhost:8083/verify";

/// Writes `<name>.json` describing a registration with the given endpoints.
#[allow(dead_code)]
pub fn write_registration(dir: &Path, name: &str, label: &str, auth_url: &str, token_url: &str) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    let body = serde_json::json!({
        "label": label,
        "clientid": "client-id",
        "clientsecret": "client-secret",
        "authurl": auth_url,
        "tokenurl": token_url,
    });
    std::fs::write(&path, body.to_string()).expect("failed to write registration");
    path
}

/// Token endpoint JSON body.
#[allow(dead_code)]
pub fn token_body(access_token: &str, refresh_token: Option<&str>, expires_in: Option<i64>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    if let Some(secs) = expires_in {
        body["expires_in"] = serde_json::Value::from(secs);
    }
    body
}

#[allow(dead_code)]
pub fn directory_provider(dir: &TempDir) -> Arc<DirectoryProvider> {
    Arc::new(DirectoryProvider::new(
        dir.path(),
        REDIRECT_URL,
        reqwest::Client::new(),
    ))
}

/// Router over `provider` plus its flow engine, for `oneshot` requests.
#[allow(dead_code)]
pub fn test_router(provider: Arc<dyn Provider>) -> (Router, Arc<FlowEngine>) {
    let engine = Arc::new(FlowEngine::new(provider, Duration::from_secs(600)));
    let app = router(AppState::new(engine.clone(), None));
    (app, engine)
}
