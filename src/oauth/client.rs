//! OAuth2 authorization-code client
//!
//! [`OAuthClient`] builds authorize redirects and talks to the token endpoint
//! for one registration: the code-for-token exchange after a callback and the
//! refresh grant used by the fetch client.
//!
//! Token endpoints answer either with JSON (RFC 6749 section 5.1) or, for a
//! few older providers, with an `application/x-www-form-urlencoded` body.
//! Both shapes are accepted.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{BrokerError, Result};
use crate::oauth::params::AuthParams;
use crate::oauth::token::OAuthToken;

// ---------------------------------------------------------------------------
// OAuthClient
// ---------------------------------------------------------------------------

/// Client credentials and endpoints for one registration.
///
/// The wrapped `reqwest::Client` is shared; cloning an `OAuthClient` does not
/// open new connections.
///
/// # Examples
///
/// ```
/// use authbroker::oauth::{AuthParams, OAuthClient};
///
/// let client = OAuthClient::new(
///     reqwest::Client::new(),
///     "my-client",
///     "secret",
///     "http://localhost:8083/verify",
///     "https://idp.example/auth",
///     "https://idp.example/token",
/// );
///
/// let url = client.authorize_url("state123", &AuthParams::new()).unwrap();
/// assert!(url.as_str().contains("client_id=my-client"));
/// ```
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    auth_url: String,
    token_url: String,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl OAuthClient {
    /// Creates a client for the given credentials and endpoints.
    pub fn new(
        http: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Builds the authorize redirect for `state`.
    ///
    /// Parameters are appended after any query the endpoint already has, in
    /// the order `response_type`, `client_id`, `redirect_uri`, `state`,
    /// followed by `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Decode`] if the stored authorization endpoint is
    /// not an absolute URL.
    pub fn authorize_url(&self, state: &str, extra: &AuthParams) -> Result<Url> {
        let mut url = Url::parse(&self.auth_url).map_err(|e| {
            BrokerError::Decode(format!(
                "invalid authorization endpoint '{}': {e}",
                self.auth_url
            ))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            if !self.redirect_url.is_empty() {
                query.append_pair("redirect_uri", &self.redirect_url);
            }
            query.append_pair("state", state);
            for (key, value) in extra.iter() {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Exchanges an authorization code for a token.
    ///
    /// `extra` is sent alongside the standard grant parameters. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ExchangeFailed`] on transport failure, a non-2xx
    /// status, an error body, or a response without an access token.
    pub async fn exchange(&self, code: &str, extra: &AuthParams) -> Result<OAuthToken> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
        ];
        if !self.redirect_url.is_empty() {
            form.push(("redirect_uri", &self.redirect_url));
        }
        form.extend(extra.iter());

        self.request_token(form).await
    }

    /// Obtains a fresh access token with a refresh token.
    ///
    /// When the endpoint does not rotate the refresh token, the one passed in
    /// is carried over to the result.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken> {
        let form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let mut token = self.request_token(form).await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn request_token<'a>(&'a self, mut form: Vec<(&'a str, &'a str)>) -> Result<OAuthToken> {
        form.push(("client_id", &self.client_id));
        if !self.client_secret.is_empty() {
            form.push(("client_secret", &self.client_secret));
        }

        tracing::debug!(
            "Requesting token from {} for client {}",
            self.token_url,
            self.client_id
        );

        let resp = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| BrokerError::ExchangeFailed(format!("token request failed: {e}")))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.text().await.map_err(|e| {
            BrokerError::ExchangeFailed(format!("failed to read token response: {e}"))
        })?;

        let parsed = parse_token_response(&content_type, &body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.error_message())
                .unwrap_or(body);
            return Err(BrokerError::ExchangeFailed(format!(
                "token endpoint returned {status}: {detail}"
            ))
            .into());
        }

        let response = parsed.map_err(|e| {
            BrokerError::ExchangeFailed(format!("failed to parse token response: {e}"))
        })?;
        response.into_oauth_token()
    }
}

// ---------------------------------------------------------------------------
// Token endpoint response
// ---------------------------------------------------------------------------

/// Raw token endpoint response, before conversion into an [`OAuthToken`].
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn from_form(body: &str) -> Self {
        let fields: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        let take = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            access_token: take("access_token").unwrap_or_default(),
            token_type: take("token_type").unwrap_or_default(),
            refresh_token: take("refresh_token"),
            expires_in: take("expires_in").and_then(|v| v.trim().parse().ok()),
            error: take("error"),
            error_description: take("error_description"),
        }
    }

    fn error_message(&self) -> Option<String> {
        let error = self.error.as_deref()?;
        Some(match self.error_description.as_deref() {
            Some(description) if !description.is_empty() => format!("{error}: {description}"),
            _ => error.to_string(),
        })
    }

    /// Converts the response, rejecting error bodies and empty tokens.
    ///
    /// A zero, missing, or unrepresentably large `expires_in` yields a token
    /// without expiry.
    fn into_oauth_token(self) -> Result<OAuthToken> {
        if let Some(message) = self.error_message() {
            return Err(BrokerError::ExchangeFailed(message).into());
        }
        if self.access_token.is_empty() {
            return Err(BrokerError::ExchangeFailed(
                "server response missing access_token".to_string(),
            )
            .into());
        }

        let expires_at = self
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| chrono::Utc::now().checked_add_signed(lifetime));

        Ok(OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
        })
    }
}

fn parse_token_response(content_type: &str, body: &str) -> std::result::Result<TokenResponse, String> {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "application/x-www-form-urlencoded" | "text/plain" => Ok(TokenResponse::from_form(body)),
        _ => serde_json::from_str(body).map_err(|e| e.to_string()),
    }
}

/// Accepts `expires_in` as a JSON number or a numeric string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Int(secs)) => Some(secs),
        Some(Raw::Float(secs)) => Some(secs as i64),
        Some(Raw::Text(secs)) => secs.trim().parse().ok(),
    })
}
