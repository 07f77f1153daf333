//! OAuth2 capability contracts
//!
//! The flow engine, dashboard and CLI only ever talk to the three traits
//! defined here, held as trait objects:
//!
//! - [`Config`]: one client registration (`Arc<dyn Config>`)
//! - [`TokenPersistence`]: the token slot of one registration
//!   (`Box<dyn TokenPersistence>`)
//! - [`Provider`]: a catalog of registrations and their token slots
//!   (`Arc<dyn Provider>`)
//!
//! # Module Layout
//!
//! - [`client`]       -- authorize URL building, code exchange and refresh
//! - [`params`]       -- ordered extra authorization parameters
//! - [`registration`] -- the concrete [`Config`] built by both backends
//! - [`token`]        -- token value and dashboard health classification

pub mod client;
pub mod params;
pub mod registration;
pub mod token;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

pub use client::OAuthClient;
pub use params::AuthParams;
pub use registration::Registration;
pub use token::{OAuthToken, TokenHealth};

/// Parameter merged into every authorize and exchange request unless the
/// registration overrides it.
pub const DEFAULT_FLOW_TYPE: (&str, &str) = ("type", "web_server");

/// A single OAuth2 client registration.
#[async_trait]
pub trait Config: Send + Sync + fmt::Debug {
    /// Unique identifier within the owning [`Provider`].
    fn identifier(&self) -> &str;

    /// Human-readable name shown on the dashboard.
    fn label(&self) -> &str;

    /// Backend location of the registration (file path or resource IRI).
    fn source(&self) -> &str;

    /// Identifier the registration carries in its backend, when it has one
    /// besides [`identifier`](Config::identifier).
    fn external_id(&self) -> Option<&str> {
        None
    }

    fn authorization_endpoint(&self) -> &str;

    fn token_endpoint(&self) -> &str;

    /// Extra parameters forwarded to authorize and exchange requests.
    fn extra_params(&self) -> &AuthParams;

    /// Builds the authorize redirect URL carrying `state` and `extra`.
    fn build_authorize_url(&self, state: &str, extra: &AuthParams) -> Result<Url>;

    /// Exchanges an authorization code for a token.
    async fn exchange(&self, code: &str, extra: &AuthParams) -> Result<OAuthToken>;

    /// Redeems a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken>;
}

/// Token slot for one registration.
#[async_trait]
pub trait TokenPersistence: Send + Sync {
    /// Reads the stored token.
    ///
    /// Returns `Ok(None)` when the registration was never authorized; read
    /// and decode failures are errors.
    async fn current_token(&self) -> Result<Option<OAuthToken>>;

    /// Replaces the stored token.
    async fn set_token(&self, token: &OAuthToken) -> Result<()>;
}

/// A catalog of registrations backed by one storage system.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Enumerates all registrations.
    ///
    /// Individual malformed records are skipped with a warning.
    async fn list_configs(&self) -> Result<Vec<Arc<dyn Config>>>;

    /// Loads one registration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotFound`](crate::error::BrokerError::NotFound)
    /// when no registration has this identifier.
    async fn lookup_config(&self, identifier: &str) -> Result<Arc<dyn Config>>;

    /// Returns the token slot for `config`.
    fn token_store_for(&self, config: &dyn Config) -> Box<dyn TokenPersistence>;

    /// Registrations of the given RDF type that already hold a token.
    ///
    /// Backends without typing return an empty list.
    async fn configs_of_type(&self, _rdf_type: &str) -> Result<Vec<Arc<dyn Config>>> {
        Ok(Vec::new())
    }
}
