//! Triple-store persistence backend
//!
//! Registrations are `oauth:Client` resources in a SPARQL store. A
//! registration's identifier is its resource IRI; its `dc:identifier` value
//! is kept as the external id. Tokens are stored as one JSON string literal
//! per client in the `<tokens>` graph.
//!
//! # Module Layout
//!
//! - [`query`]      -- fixed statement templates and the escaping builder
//! - [`repository`] -- the [`SparqlRepository`] seam and its HTTP client
//! - [`memory`]     -- in-memory repository for tests

pub mod memory;
pub mod query;
pub mod repository;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::{BrokerError, Result};
use crate::oauth::{AuthParams, Config, OAuthClient, OAuthToken, Provider, Registration, TokenPersistence};

use self::query::{validate_iri, QueryBuilder, QueryKind, TOKEN_GRAPH};
use self::repository::{Solution, SparqlRepository};

pub use self::memory::MemoryRepository;
pub use self::repository::HttpRepository;

// ---------------------------------------------------------------------------
// SparqlProvider
// ---------------------------------------------------------------------------

/// [`Provider`] over a SPARQL repository.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use authbroker::oauth::Provider;
/// use authbroker::persistence::sparql::{MemoryRepository, SparqlProvider};
///
/// # #[tokio::main]
/// # async fn main() -> authbroker::Result<()> {
/// let provider = SparqlProvider::new(Arc::new(MemoryRepository::new()), reqwest::Client::new());
/// assert!(provider.list_configs().await?.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SparqlProvider {
    repo: Arc<dyn SparqlRepository>,
    http: reqwest::Client,
}

impl SparqlProvider {
    pub fn new(repo: Arc<dyn SparqlRepository>, http: reqwest::Client) -> Self {
        Self { repo, http }
    }

    /// Loads the extra authorization parameters of `client`, sorted by name.
    async fn params_for(&self, client: &str) -> Result<AuthParams> {
        let query = QueryBuilder::new(QueryKind::Params)
            .iri("client", client)?
            .build()?;
        let rows = self.repo.query(&query).await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in &rows {
            pairs.push((text(row, "option")?, text(row, "value")?));
        }
        Ok(AuthParams::from_pairs(pairs))
    }

    fn decode_registration(&self, client: &str, row: &Solution) -> Result<Registration> {
        let oauth = OAuthClient::new(
            self.http.clone(),
            text(row, "clientid")?,
            text(row, "clientsecret")?,
            text(row, "redirecturl")?,
            text(row, "authurl")?,
            text(row, "tokenurl")?,
        );
        Ok(Registration::new(client, text(row, "label")?, oauth)
            .with_external_id(text(row, "identifier")?))
    }

    async fn with_params(&self, registration: Registration) -> Result<Arc<dyn Config>> {
        let params = self.params_for(registration.identifier()).await?;
        Ok(Arc::new(registration.with_params(params)))
    }
}

fn text(row: &Solution, var: &str) -> Result<String> {
    row.get(var)
        .map(|term| term.value().to_string())
        .ok_or_else(|| BrokerError::Decode(format!("result row has no ?{var} binding")).into())
}

fn resource(row: &Solution, var: &str) -> Result<String> {
    match row.get(var) {
        Some(term) => term.as_iri().map(str::to_string).ok_or_else(|| {
            BrokerError::Decode(format!("?{var} is not an IRI: {}", term.value())).into()
        }),
        None => Err(BrokerError::Decode(format!("result row has no ?{var} binding")).into()),
    }
}

#[async_trait]
impl Provider for SparqlProvider {
    async fn list_configs(&self) -> Result<Vec<Arc<dyn Config>>> {
        let query = QueryBuilder::new(QueryKind::Clients).build()?;
        let rows = self.repo.query(&query).await?;

        let mut seen = BTreeSet::new();
        let mut registrations = Vec::new();
        for row in &rows {
            let decoded =
                resource(row, "client").and_then(|iri| self.decode_registration(&iri, row));
            match decoded {
                Ok(registration) => {
                    if seen.insert(registration.identifier().to_string()) {
                        registrations.push(registration);
                    }
                }
                Err(e) => tracing::warn!("Skipping registration row: {:#}", e),
            }
        }
        registrations.sort_by(|a, b| a.identifier().cmp(b.identifier()));

        let configs = try_join_all(registrations.into_iter().map(|r| self.with_params(r))).await?;
        tracing::debug!("Loaded {} registrations from triple store", configs.len());
        Ok(configs)
    }

    async fn lookup_config(&self, identifier: &str) -> Result<Arc<dyn Config>> {
        if validate_iri(identifier).is_err() {
            return Err(BrokerError::NotFound(identifier.to_string()).into());
        }

        let query = QueryBuilder::new(QueryKind::Client)
            .iri("client", identifier)?
            .build()?;
        let rows = self.repo.query(&query).await?;
        let row = rows
            .first()
            .ok_or_else(|| BrokerError::NotFound(identifier.to_string()))?;

        let registration = self.decode_registration(identifier, row)?;
        self.with_params(registration).await
    }

    fn token_store_for(&self, config: &dyn Config) -> Box<dyn TokenPersistence> {
        Box::new(RepositoryToken::new(self.repo.clone(), config.source()))
    }

    async fn configs_of_type(&self, rdf_type: &str) -> Result<Vec<Arc<dyn Config>>> {
        let query = QueryBuilder::new(QueryKind::ClientsOfType)
            .iri("client_type", rdf_type)?
            .build()?;
        let rows = self.repo.query(&query).await?;

        let mut items = BTreeSet::new();
        for row in &rows {
            match resource(row, "item") {
                Ok(iri) => {
                    items.insert(iri);
                }
                Err(e) => tracing::warn!("Skipping typed resource row: {:#}", e),
            }
        }

        let mut configs = Vec::with_capacity(items.len());
        for iri in items {
            match self.lookup_config(&iri).await {
                Ok(config) => configs.push(config),
                Err(e) => tracing::warn!("Skipping resource {} of type {}: {:#}", iri, rdf_type, e),
            }
        }
        Ok(configs)
    }
}

// ---------------------------------------------------------------------------
// RepositoryToken
// ---------------------------------------------------------------------------

/// [`TokenPersistence`] storing one client's token as a literal in the
/// token graph.
pub struct RepositoryToken {
    repo: Arc<dyn SparqlRepository>,
    client: String,
}

impl RepositoryToken {
    pub fn new(repo: Arc<dyn SparqlRepository>, client: impl Into<String>) -> Self {
        Self {
            repo,
            client: client.into(),
        }
    }
}

#[async_trait]
impl TokenPersistence for RepositoryToken {
    async fn current_token(&self) -> Result<Option<OAuthToken>> {
        let query = QueryBuilder::new(QueryKind::Token)
            .iri("graph", TOKEN_GRAPH)?
            .iri("client", &self.client)?
            .build()?;
        let rows = self.repo.query(&query).await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let literal = text(row, "token")?;
        let token = serde_json::from_str(&literal).map_err(|e| {
            BrokerError::Decode(format!("malformed token for {}: {e}", self.client))
        })?;
        Ok(Some(token))
    }

    async fn set_token(&self, token: &OAuthToken) -> Result<()> {
        let update = QueryBuilder::new(QueryKind::UpdateToken)
            .iri("graph", TOKEN_GRAPH)?
            .iri("client", &self.client)?
            .literal("token", &token.to_json()?)
            .build()?;
        self.repo.update(&update).await?;
        tracing::debug!("Stored token for {}", self.client);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sparql::memory::ClientRecord;
    use crate::persistence::sparql::repository::RdfTerm;

    const A: &str = "https://example.org/clients/a";

    fn provider(repo: &Arc<MemoryRepository>) -> SparqlProvider {
        SparqlProvider::new(repo.clone(), reqwest::Client::new())
    }

    #[test]
    fn test_text_requires_binding() {
        let row = Solution::new();
        assert!(text(&row, "label").is_err());
    }

    #[test]
    fn test_resource_requires_iri() {
        let row = Solution::from([("client".to_string(), RdfTerm::literal("a"))]);
        assert!(resource(&row, "client").is_err());
    }

    #[tokio::test]
    async fn test_lookup_keeps_dc_identifier_as_external_id() {
        let repo = Arc::new(MemoryRepository::new());
        repo.add_client(ClientRecord::new(
            A,
            "svc-a",
            "Service A",
            "https://idp.example/auth",
            "https://idp.example/token",
        ));

        let config = provider(&repo).lookup_config(A).await.unwrap();
        assert_eq!(config.identifier(), A);
        assert_eq!(config.source(), A);
        assert_eq!(config.label(), "Service A");
        assert_eq!(config.external_id(), Some("svc-a"));
    }

    #[tokio::test]
    async fn test_lookup_invalid_iri_is_not_found() {
        let repo = Arc::new(MemoryRepository::new());
        let err = provider(&repo).lookup_config("a b").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerError>(),
            Some(BrokerError::NotFound(_))
        ));
        assert!(repo.executed().is_empty());
    }

    #[tokio::test]
    async fn test_configs_of_type_rejects_bad_type() {
        let repo = Arc::new(MemoryRepository::new());
        let err = provider(&repo).configs_of_type("x> }").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerError>(),
            Some(BrokerError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_token_literal_is_decode_error() {
        let repo = Arc::new(MemoryRepository::new());
        repo.put_token_literal(TOKEN_GRAPH, A, "");
        let store = RepositoryToken::new(repo.clone(), A);
        let err = store.current_token().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerError>(),
            Some(BrokerError::Decode(_))
        ));
    }
}
