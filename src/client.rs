//! Authenticated HTTP client for stored tokens
//!
//! [`BearerClient`] makes requests on behalf of one registration using the
//! token the broker stored for it. A token that is expired, or about to
//! expire, is refreshed with its refresh token first and the new token is
//! written back to the registration's token store.

use std::sync::Arc;

use crate::error::{BrokerError, Result};
use crate::oauth::{Config, OAuthToken, TokenPersistence};

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_LEEWAY_SECS: i64 = 10;

/// HTTP client bound to one registration's token.
pub struct BearerClient {
    http: reqwest::Client,
    config: Arc<dyn Config>,
    store: Box<dyn TokenPersistence>,
}

impl BearerClient {
    pub fn new(
        http: reqwest::Client,
        config: Arc<dyn Config>,
        store: Box<dyn TokenPersistence>,
    ) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    /// Returns a usable token, refreshing and persisting it when needed.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::BadRequest`] if the registration was never authorized
    /// - [`BrokerError::ExchangeFailed`] if the token is expired and cannot
    ///   be refreshed
    pub async fn valid_token(&self) -> Result<OAuthToken> {
        let token = self.store.current_token().await?.ok_or_else(|| {
            BrokerError::BadRequest(format!(
                "registration '{}' has not been authorized yet",
                self.config.identifier()
            ))
        })?;

        if !token.expires_within(chrono::Duration::seconds(EXPIRY_LEEWAY_SECS)) {
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BrokerError::ExchangeFailed(format!(
                    "token for '{}' expired and no refresh token is stored",
                    self.config.identifier()
                ))
            })?;

        tracing::info!("Refreshing token for {}", self.config.identifier());
        let refreshed = self.config.refresh(refresh_token).await?;
        self.store.set_token(&refreshed).await?;
        Ok(refreshed)
    }

    /// Sends `GET url` with the registration's bearer token.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let token = self.valid_token().await?;
        tracing::debug!("GET {} as {}", url, self.config.identifier());
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await
            .map_err(BrokerError::from)?;
        Ok(resp)
    }
}
