//! OAuth tokens and their health classification
//!
//! [`OAuthToken`] is the canonical token value written by every
//! [`TokenPersistence`](super::TokenPersistence) backend. Its JSON form is
//! `{access_token, token_type, refresh_token, expiry}` with an RFC 3339
//! `expiry`, which keeps token files readable by earlier tooling.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// OAuthToken
// ---------------------------------------------------------------------------

/// An access token obtained from a token endpoint.
///
/// # Examples
///
/// ```
/// use authbroker::oauth::OAuthToken;
///
/// let token = OAuthToken::bearer("my_access_token");
///
/// // A token with no expiry is never considered expired.
/// assert!(!token.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// The access token string issued by the authorization server.
    #[serde(default)]
    pub access_token: String,

    /// The token type, typically `"Bearer"`.
    #[serde(default)]
    pub token_type: String,

    /// Refresh token usable to obtain a new access token without consent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// UTC timestamp at which the access token expires.
    ///
    /// `None` means the token does not expire. Serialized as `expiry`.
    #[serde(
        rename = "expiry",
        default,
        skip_serializing_if = "Option::is_none",
        with = "expiry_format"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Creates a non-expiring bearer token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Returns `true` once the expiry timestamp has passed.
    ///
    /// Tokens without an expiry are never expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns `true` when the token expires within `leeway` from now.
    ///
    /// Used by the fetch client to refresh slightly ahead of expiry.
    pub fn expires_within(&self, leeway: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() + leeway >= at)
    }

    /// Returns `true` when the token carries a non-empty access token.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Value for an `Authorization` header.
    ///
    /// An empty token type defaults to `Bearer`.
    pub fn authorization_header(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", token_type, self.access_token)
    }

    /// Serializes the token to its stored JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// RFC 3339 serialization for the optional expiry.
///
/// The zero timestamp (`0001-01-01T00:00:00Z`) and empty strings read back
/// as `None`.
mod expiry_format {
    use super::{DateTime, Datelike, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(at) => {
                serializer.serialize_str(&at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let raw = match raw.as_deref() {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        let at = DateTime::parse_from_rfc3339(raw)
            .map_err(D::Error::custom)?
            .with_timezone(&Utc);

        if at.year() <= 1 {
            Ok(None)
        } else {
            Ok(Some(at))
        }
    }
}

// ---------------------------------------------------------------------------
// TokenHealth
// ---------------------------------------------------------------------------

/// Dashboard classification of a registration's stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHealth {
    /// The token could not be read, or its access token is empty.
    Red,
    /// Never authorized.
    White,
    /// Present and not expired, or without an expiry.
    Green,
    /// Present but expired.
    Yellow,
}

impl TokenHealth {
    /// Classifies the outcome of a `current_token` call.
    ///
    /// # Examples
    ///
    /// ```
    /// use authbroker::oauth::{OAuthToken, TokenHealth};
    ///
    /// let read: authbroker::Result<Option<OAuthToken>> = Ok(None);
    /// assert_eq!(TokenHealth::classify(&read), TokenHealth::White);
    ///
    /// let read = Ok(Some(OAuthToken::bearer("abc")));
    /// assert_eq!(TokenHealth::classify(&read), TokenHealth::Green);
    /// ```
    pub fn classify(read: &Result<Option<OAuthToken>>) -> Self {
        match read {
            Err(_) => Self::Red,
            Ok(None) => Self::White,
            Ok(Some(token)) if !token.has_access_token() => Self::Red,
            Ok(Some(token)) if token.is_expired() => Self::Yellow,
            Ok(Some(_)) => Self::Green,
        }
    }

    /// W3.CSS class used by the dashboard.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Red => "w3-red",
            Self::White => "w3-white",
            Self::Green => "w3-green",
            Self::Yellow => "w3-yellow",
        }
    }

    /// Short status word for terminal output.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Red => "error",
            Self::White => "not authorized",
            Self::Green => "valid",
            Self::Yellow => "expired",
        }
    }
}
