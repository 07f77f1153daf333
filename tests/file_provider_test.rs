//! Directory-backed provider integration tests
//!
//! Covers enumeration with malformed records, lookup, and the token file
//! lifecycle through the [`Provider`] / [`TokenPersistence`] contracts.

mod common;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use authbroker::error::BrokerError;
use authbroker::oauth::{OAuthToken, Provider};

use common::{directory_provider, write_registration};

fn populated_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_registration(dir.path(), "svc-a", "Service A", "https://idp.example/auth", "https://idp.example/token");
    write_registration(dir.path(), "svc-b", "Service B", "https://idp.example/auth", "https://idp.example/token");
    std::fs::write(
        dir.path().join("svc-c.yaml"),
        "label: Service C\nclientid: c\nauthurl: https://c.example/auth\ntokenurl: https://c.example/token\nparams:\n  access_type: offline\n",
    )
    .expect("write yaml");
    std::fs::write(dir.path().join("broken.json"), "{ not json").expect("write broken");
    std::fs::write(dir.path().join("partial.yml"), "label: only a label\n").expect("write partial");
    std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");
    dir
}

#[tokio::test]
async fn test_list_configs_skips_malformed_records() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);

    let configs = provider.list_configs().await.expect("listing never fails on bad records");
    let ids: Vec<&str> = configs.iter().map(|c| c.identifier()).collect();
    assert_eq!(ids, vec!["svc-a", "svc-b", "svc-c"]);
    assert_eq!(configs[2].label(), "Service C");
    assert_eq!(configs[2].extra_params().get("access_type"), Some("offline"));
}

#[tokio::test]
async fn test_list_configs_missing_directory_is_backend_error() {
    let dir = TempDir::new().expect("tempdir");
    let provider = authbroker::persistence::file::DirectoryProvider::new(
        dir.path().join("absent"),
        common::REDIRECT_URL,
        reqwest::Client::new(),
    );
    let err = provider.list_configs().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BrokerError>(),
        Some(BrokerError::BackendUnavailable(_))
    ));
}

#[tokio::test]
async fn test_lookup_config_by_stem() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);

    let config = provider.lookup_config("svc-a").await.expect("svc-a exists");
    assert_eq!(config.label(), "Service A");
    assert_eq!(config.token_endpoint(), "https://idp.example/token");
    assert!(config.source().ends_with("svc-a.json"));
}

#[tokio::test]
async fn test_lookup_config_rejects_unknown_and_traversal() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);

    for id in ["missing", "../svc-a", "..", "sub/svc-a", ""] {
        let err = provider.lookup_config(id).await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<BrokerError>(), Some(BrokerError::NotFound(_))),
            "expected NotFound for {id:?}, got {err:#}"
        );
    }
}

#[tokio::test]
async fn test_never_written_token_is_none() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);
    let config = provider.lookup_config("svc-b").await.unwrap();

    let store = provider.token_store_for(config.as_ref());
    assert!(store.current_token().await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_then_current_token_round_trip() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);
    let config = provider.lookup_config("svc-a").await.unwrap();
    let store = provider.token_store_for(config.as_ref());

    let token = OAuthToken {
        access_token: "access-1".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(Utc.with_ymd_and_hms(2031, 5, 6, 7, 8, 9).unwrap()),
    };
    store.set_token(&token).await.unwrap();
    assert_eq!(store.current_token().await.unwrap(), Some(token.clone()));

    let on_disk = std::fs::read_to_string(dir.path().join("svc-a.json.token")).unwrap();
    assert!(on_disk.contains("\"expiry\":\"2031-05-06T07:08:09Z\""));

    // Overwrite leaves no temp files behind.
    store.set_token(&OAuthToken::bearer("access-2")).await.unwrap();
    let current = store.current_token().await.unwrap().unwrap();
    assert_eq!(current.access_token, "access-2");
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    // The token file is not mistaken for a registration.
    assert_eq!(provider.list_configs().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_token_file_is_decode_error() {
    let dir = populated_dir();
    std::fs::write(dir.path().join("svc-a.json.token"), "garbage").unwrap();
    let provider = directory_provider(&dir);
    let config = provider.lookup_config("svc-a").await.unwrap();

    let err = provider
        .token_store_for(config.as_ref())
        .current_token()
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BrokerError>(),
        Some(BrokerError::Decode(_))
    ));
}

#[tokio::test]
async fn test_file_provider_has_no_typed_configs() {
    let dir = populated_dir();
    let provider = directory_provider(&dir);
    assert!(provider.configs_of_type("https://example.org/Type").await.unwrap().is_empty());
}
