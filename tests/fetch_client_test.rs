//! Bearer-token client integration tests
//!
//! A stored token is attached to outgoing requests; an expired one is
//! refreshed against the token endpoint and written back first.

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authbroker::client::BearerClient;
use authbroker::error::BrokerError;
use authbroker::oauth::{Config, OAuthToken, Provider, TokenPersistence};
use authbroker::persistence::file::DirectoryProvider;

use common::{directory_provider, token_body, write_registration};

async fn registration(server: &MockServer) -> (TempDir, Arc<DirectoryProvider>, Arc<dyn Config>) {
    let dir = TempDir::new().unwrap();
    write_registration(
        dir.path(),
        "svc-a",
        "Service A",
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
    );
    let provider = directory_provider(&dir);
    let config = provider.lookup_config("svc-a").await.unwrap();
    (dir, provider, config)
}

fn store(provider: &DirectoryProvider, config: &Arc<dyn Config>) -> Box<dyn TokenPersistence> {
    provider.token_store_for(config.as_ref())
}

#[tokio::test]
async fn test_get_sends_stored_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer stored"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, provider, config) = registration(&server).await;
    store(&provider, &config)
        .set_token(&OAuthToken::bearer("stored"))
        .await
        .unwrap();

    let client = BearerClient::new(reqwest::Client::new(), config.clone(), store(&provider, &config));
    let resp = client.get(&format!("{}/data", server.uri())).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "payload");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "fresh",
            Some("r2"),
            Some(3600),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, provider, config) = registration(&server).await;
    let expired = OAuthToken {
        access_token: "stale".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("r1".to_string()),
        expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
    };
    store(&provider, &config).set_token(&expired).await.unwrap();

    let client = BearerClient::new(reqwest::Client::new(), config.clone(), store(&provider, &config));
    client.get(&format!("{}/data", server.uri())).await.unwrap();

    let persisted = store(&provider, &config).current_token().await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "fresh");
    assert_eq!(persisted.refresh_token.as_deref(), Some("r2"));
    assert!(!persisted.is_expired());
}

#[tokio::test]
async fn test_unauthorized_registration_is_rejected() {
    let server = MockServer::start().await;
    let (_dir, provider, config) = registration(&server).await;

    let client = BearerClient::new(reqwest::Client::new(), config.clone(), store(&provider, &config));
    let err = client.valid_token().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BrokerError>(),
        Some(BrokerError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_expired_token_without_refresh_token_fails() {
    let server = MockServer::start().await;
    let (_dir, provider, config) = registration(&server).await;
    let expired = OAuthToken {
        expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
        ..OAuthToken::bearer("stale")
    };
    store(&provider, &config).set_token(&expired).await.unwrap();

    let client = BearerClient::new(reqwest::Client::new(), config.clone(), store(&provider, &config));
    let err = client.valid_token().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BrokerError>(),
        Some(BrokerError::ExchangeFailed(_))
    ));
}
