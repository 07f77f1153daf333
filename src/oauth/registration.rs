//! Concrete registration snapshot shared by the persistence backends

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::oauth::client::OAuthClient;
use crate::oauth::params::AuthParams;
use crate::oauth::token::OAuthToken;
use crate::oauth::Config;

/// One OAuth2 client registration as loaded from a backend.
///
/// A `Registration` is an immutable snapshot; backends build a new one on
/// every lookup.
///
/// # Examples
///
/// ```
/// use authbroker::oauth::{AuthParams, Config, OAuthClient, Registration};
///
/// let client = OAuthClient::new(
///     reqwest::Client::new(),
///     "id",
///     "secret",
///     "http://localhost:8083/verify",
///     "https://idp.example/auth",
///     "https://idp.example/token",
/// );
/// let registration = Registration::new("svc-a", "Service A", client)
///     .with_params(AuthParams::from_pairs([("access_type", "offline")]));
///
/// assert_eq!(registration.identifier(), "svc-a");
/// assert_eq!(registration.extra_params().get("access_type"), Some("offline"));
/// ```
#[derive(Debug, Clone)]
pub struct Registration {
    identifier: String,
    source: String,
    label: String,
    external_id: Option<String>,
    params: AuthParams,
    client: OAuthClient,
}

impl Registration {
    /// Creates a registration whose source equals its identifier.
    pub fn new(identifier: impl Into<String>, label: impl Into<String>, client: OAuthClient) -> Self {
        let identifier = identifier.into();
        Self {
            source: identifier.clone(),
            identifier,
            label: label.into(),
            external_id: None,
            params: AuthParams::new(),
            client,
        }
    }

    /// Sets the backend location (file path or resource IRI).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_params(mut self, params: AuthParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the identifier the registration carries inside its backend
    /// record, when that differs from [`Config::identifier`].
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

}

#[async_trait]
impl Config for Registration {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    fn authorization_endpoint(&self) -> &str {
        self.client.auth_url()
    }

    fn token_endpoint(&self) -> &str {
        self.client.token_url()
    }

    fn extra_params(&self) -> &AuthParams {
        &self.params
    }

    fn build_authorize_url(&self, state: &str, extra: &AuthParams) -> Result<Url> {
        self.client.authorize_url(state, extra)
    }

    async fn exchange(&self, code: &str, extra: &AuthParams) -> Result<OAuthToken> {
        self.client.exchange(code, extra).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken> {
        self.client.refresh(refresh_token).await
    }
}
