//! Authorization-flow engine
//!
//! [`FlowEngine`] drives the two halves of the authorization-code flow:
//!
//! 1. [`FlowEngine::authenticate`] looks up a registration, mints a random
//!    `state`, remembers which registration it belongs to, and returns the
//!    authorize URL to redirect the browser to.
//! 2. [`FlowEngine::verify`] handles the redirect back. The pending flow for
//!    the presented `state` is consumed before anything else is checked, so
//!    every state is usable at most once. A valid callback has its code
//!    exchanged and the token written through the registration's
//!    [`TokenPersistence`](crate::oauth::TokenPersistence).
//!
//! Pending flows live only in memory and expire after a configurable TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::Deserialize;
use url::Url;

use crate::error::{BrokerError, Result};
use crate::oauth::{Config, OAuthToken, Provider, DEFAULT_FLOW_TYPE};

/// Random bytes per state token (256 bits).
const STATE_BYTES: usize = 32;

/// Query parameters of the authorization server's redirect back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Callback {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

struct PendingFlow {
    config: Arc<dyn Config>,
    created: Instant,
}

/// Generates a state token: 32 random bytes, base64url without padding.
pub fn generate_state() -> String {
    use rand::RngCore as _;
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Starts and completes authorization flows for one [`Provider`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use authbroker::persistence::file::DirectoryProvider;
/// use authbroker::server::flow::FlowEngine;
///
/// # async fn example() -> authbroker::Result<()> {
/// let provider = Arc::new(DirectoryProvider::new(
///     "clients",
///     "http://localhost:8083/verify",
///     reqwest::Client::new(),
/// ));
/// let engine = FlowEngine::new(provider, Duration::from_secs(600));
/// let redirect = engine.authenticate("svc-a").await?;
/// println!("open {redirect}");
/// # Ok(())
/// # }
/// ```
pub struct FlowEngine {
    provider: Arc<dyn Provider>,
    pending: Mutex<HashMap<String, PendingFlow>>,
    ttl: Duration,
}

impl FlowEngine {
    pub fn new(provider: Arc<dyn Provider>, ttl: Duration) -> Self {
        Self {
            provider,
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Number of flows awaiting their callback.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingFlow>> {
        // The map is left consistent by every critical section, so a
        // poisoned lock is still usable.
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begins a flow for `identifier` and returns the authorize URL.
    ///
    /// Expired pending flows are swept on every call.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::BadRequest`] if `identifier` is empty
    /// - [`BrokerError::NotFound`] if no registration matches
    pub async fn authenticate(&self, identifier: &str) -> Result<Url> {
        if identifier.is_empty() {
            return Err(BrokerError::BadRequest("id is not provided".to_string()).into());
        }

        let config = self.provider.lookup_config(identifier).await?;
        let extra = config
            .extra_params()
            .clone()
            .with_default(DEFAULT_FLOW_TYPE.0, DEFAULT_FLOW_TYPE.1);

        let state = generate_state();
        let url = config.build_authorize_url(&state, &extra)?;

        {
            let mut pending = self.lock_pending();
            let ttl = self.ttl;
            pending.retain(|_, flow| flow.created.elapsed() < ttl);
            pending.insert(
                state,
                PendingFlow {
                    config: config.clone(),
                    created: Instant::now(),
                },
            );
        }

        tracing::info!("Started authorization flow for {}", config.identifier());
        Ok(url)
    }

    /// Completes a flow from the authorization server's callback.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::UpstreamDenied`] if the callback carries `error`
    /// - [`BrokerError::InvalidState`] for a missing, unknown, reused or
    ///   expired state
    /// - [`BrokerError::BadRequest`] if `code` is missing
    /// - [`BrokerError::ExchangeFailed`] if the token endpoint fails or
    ///   returns no access token
    /// - any error from writing the token
    pub async fn verify(&self, callback: &Callback) -> Result<OAuthToken> {
        let state = callback.state.as_deref().unwrap_or_default();
        let flow = if state.is_empty() {
            None
        } else {
            self.lock_pending().remove(state)
        };

        if let Some(error) = callback.error.as_deref().filter(|e| !e.is_empty()) {
            if let Some(flow) = &flow {
                tracing::warn!(
                    "Authorization for {} denied by provider: {}",
                    flow.config.identifier(),
                    error
                );
            }
            return Err(BrokerError::UpstreamDenied {
                error: error.to_string(),
                description: callback.error_description.clone(),
            }
            .into());
        }

        if state.is_empty() {
            return Err(BrokerError::InvalidState("state is not provided".to_string()).into());
        }
        let flow = flow.ok_or_else(|| BrokerError::InvalidState("unknown state".to_string()))?;
        if flow.created.elapsed() >= self.ttl {
            return Err(BrokerError::InvalidState("state has expired".to_string()).into());
        }

        let code = callback.code.as_deref().unwrap_or_default();
        if code.is_empty() {
            return Err(BrokerError::BadRequest("code is not provided".to_string()).into());
        }

        let config = flow.config;
        let extra = config
            .extra_params()
            .clone()
            .with_default(DEFAULT_FLOW_TYPE.0, DEFAULT_FLOW_TYPE.1);
        let token = config.exchange(code, &extra).await?;
        if !token.has_access_token() {
            return Err(BrokerError::ExchangeFailed(
                "token response has an empty access token".to_string(),
            )
            .into());
        }

        self.provider
            .token_store_for(config.as_ref())
            .set_token(&token)
            .await?;

        tracing::info!("Stored token for {}", config.identifier());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::file::DirectoryProvider;
    use crate::test_utils::{assert_error_contains, create_test_file, registration_json, temp_dir};
    use tempfile::TempDir;

    fn engine(ttl: Duration) -> (TempDir, FlowEngine) {
        let dir = temp_dir();
        create_test_file(&dir, "svc-a.json", &registration_json("Service A", "https://idp.example"));
        let provider = DirectoryProvider::new(
            dir.path(),
            "http://localhost:8083/verify",
            reqwest::Client::new(),
        );
        (dir, FlowEngine::new(Arc::new(provider), ttl))
    }

    fn state_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_generate_state_length_and_alphabet() {
        let state = generate_state();
        assert_eq!(state.len(), 43);
        assert!(state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generate_state_produces_unique_values() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_authenticate_registers_pending_flow() {
        let (_dir, engine) = engine(Duration::from_secs(600));
        let url = engine.authenticate("svc-a").await.unwrap();
        assert!(url.as_str().starts_with("https://idp.example/auth?response_type=code"));
        assert!(url.as_str().ends_with("&type=web_server"));
        assert_eq!(state_of(&url).len(), 43);
        assert_eq!(engine.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_and_unknown_ids() {
        let (_dir, engine) = engine(Duration::from_secs(600));
        assert_error_contains(engine.authenticate("").await, "id is not provided");
        let err = engine.authenticate("missing").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerError>(),
            Some(BrokerError::NotFound(_))
        ));
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_and_unknown_state() {
        let (_dir, engine) = engine(Duration::from_secs(600));
        let missing = Callback {
            code: Some("c".to_string()),
            ..Callback::default()
        };
        assert_error_contains(engine.verify(&missing).await, "state is not provided");

        let unknown = Callback {
            code: Some("c".to_string()),
            state: Some("nope".to_string()),
            ..Callback::default()
        };
        assert_error_contains(engine.verify(&unknown).await, "unknown state");
    }

    #[tokio::test]
    async fn test_verify_consumes_state_even_on_upstream_error() {
        let (_dir, engine) = engine(Duration::from_secs(600));
        let url = engine.authenticate("svc-a").await.unwrap();
        let denied = Callback {
            state: Some(state_of(&url)),
            error: Some("access_denied".to_string()),
            ..Callback::default()
        };
        let err = engine.verify(&denied).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerError>(),
            Some(BrokerError::UpstreamDenied { .. })
        ));
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_missing_code_consumes_state() {
        let (_dir, engine) = engine(Duration::from_secs(600));
        let url = engine.authenticate("svc-a").await.unwrap();
        let callback = Callback {
            state: Some(state_of(&url)),
            ..Callback::default()
        };
        assert_error_contains(engine.verify(&callback).await, "code is not provided");
        assert_error_contains(engine.verify(&callback).await, "unknown state");
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_state() {
        let (_dir, engine) = engine(Duration::from_millis(1));
        let url = engine.authenticate("svc-a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let callback = Callback {
            code: Some("c".to_string()),
            state: Some(state_of(&url)),
            ..Callback::default()
        };
        assert_error_contains(engine.verify(&callback).await, "state has expired");
    }
}
