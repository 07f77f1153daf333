//! In-memory [`SparqlRepository`] for tests
//!
//! [`MemoryRepository`] does not parse SPARQL. It answers each
//! [`QueryKind`] from a small in-memory model, using the values the
//! statement was built with, so the triple-store provider can be exercised
//! without a running store.
//!
//! # Example
//!
//! ```
//! use authbroker::persistence::sparql::memory::{ClientRecord, MemoryRepository};
//!
//! let repo = MemoryRepository::new();
//! repo.add_client(ClientRecord::new(
//!     "https://example.org/clients/a",
//!     "a",
//!     "Service A",
//!     "https://idp.example/auth",
//!     "https://idp.example/token",
//! ));
//! assert_eq!(repo.client_count(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{BrokerError, Result};
use crate::persistence::sparql::query::{PreparedQuery, QueryKind};
use crate::persistence::sparql::repository::{RdfTerm, Solution, SparqlRepository};

const OAUTH_CLIENT_TYPE: &str = "https://oauth.net/2#Client";

/// One `oauth:Client` resource held by [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub iri: String,
    pub identifier: String,
    pub label: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    /// Additional `rdf:type`s besides `oauth:Client`.
    pub types: Vec<String>,
    /// `oauth:param` label/value pairs, in insertion order.
    pub params: Vec<(String, String)>,
}

impl ClientRecord {
    pub fn new(
        iri: impl Into<String>,
        identifier: impl Into<String>,
        label: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            iri: iri.into(),
            identifier: identifier.into(),
            label: label.into(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:8083/verify".to_string(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            types: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_type(mut self, rdf_type: impl Into<String>) -> Self {
        self.types.push(rdf_type.into());
        self
    }

    pub fn with_param(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((label.into(), value.into()));
        self
    }

    fn registration_row(&self) -> Solution {
        let mut row = Solution::new();
        row.insert("clientid".into(), RdfTerm::literal(&self.client_id));
        row.insert("clientsecret".into(), RdfTerm::literal(&self.client_secret));
        row.insert("redirecturl".into(), RdfTerm::literal(&self.redirect_url));
        row.insert("authurl".into(), RdfTerm::literal(&self.auth_url));
        row.insert("tokenurl".into(), RdfTerm::literal(&self.token_url));
        row.insert("identifier".into(), RdfTerm::literal(&self.identifier));
        row.insert("label".into(), RdfTerm::literal(&self.label));
        row
    }

    fn has_type(&self, rdf_type: &str) -> bool {
        rdf_type == OAUTH_CLIENT_TYPE || self.types.iter().any(|t| t == rdf_type)
    }
}

#[derive(Debug, Default)]
struct Dataset {
    clients: BTreeMap<String, ClientRecord>,
    extra_client_rows: Vec<Solution>,
    /// `(graph, client)` to token literal.
    tokens: HashMap<(String, String), String>,
    executed: Vec<QueryKind>,
    unavailable: bool,
}

/// Fake triple store answering the provider's statements from memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    data: Mutex<Dataset>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Dataset> {
        // A panic while holding the lock only happens inside a failing test.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_client(&self, record: ClientRecord) {
        self.lock().clients.insert(record.iri.clone(), record);
    }

    /// Appends a raw row to enumerate-registrations results.
    ///
    /// Used to simulate records the provider cannot decode.
    pub fn add_raw_client_row(&self, row: Solution) {
        self.lock().extra_client_rows.push(row);
    }

    /// Stores a token literal directly, bypassing the provider.
    pub fn put_token_literal(&self, graph: &str, client: &str, literal: impl Into<String>) {
        self.lock()
            .tokens
            .insert((graph.to_string(), client.to_string()), literal.into());
    }

    pub fn token_literal(&self, graph: &str, client: &str) -> Option<String> {
        self.lock()
            .tokens
            .get(&(graph.to_string(), client.to_string()))
            .cloned()
    }

    /// Makes every subsequent call fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Kinds of all statements executed so far, in order.
    pub fn executed(&self) -> Vec<QueryKind> {
        self.lock().executed.clone()
    }

    fn begin(&self, statement: &PreparedQuery) -> Result<MutexGuard<'_, Dataset>> {
        let mut data = self.lock();
        data.executed.push(statement.kind());
        if data.unavailable {
            return Err(BrokerError::BackendUnavailable("memory repository offline".into()).into());
        }
        Ok(data)
    }
}

fn bound<'a>(statement: &'a PreparedQuery, name: &str) -> Result<&'a str> {
    statement.binding(name).ok_or_else(|| {
        BrokerError::BadRequest(format!(
            "{:?} statement is missing binding '{name}'",
            statement.kind()
        ))
        .into()
    })
}

#[async_trait]
impl SparqlRepository for MemoryRepository {
    async fn query(&self, query: &PreparedQuery) -> Result<Vec<Solution>> {
        let data = self.begin(query)?;

        let rows = match query.kind() {
            QueryKind::Clients => {
                let mut rows: Vec<Solution> = data
                    .clients
                    .values()
                    .map(|record| {
                        let mut row = record.registration_row();
                        row.insert("client".into(), RdfTerm::Iri(record.iri.clone()));
                        row
                    })
                    .collect();
                rows.extend(data.extra_client_rows.iter().cloned());
                rows
            }
            QueryKind::Client => {
                let client = bound(query, "client")?;
                data.clients
                    .get(client)
                    .map(|record| vec![record.registration_row()])
                    .unwrap_or_default()
            }
            QueryKind::Token => {
                let key = (
                    bound(query, "graph")?.to_string(),
                    bound(query, "client")?.to_string(),
                );
                data.tokens
                    .get(&key)
                    .map(|literal| {
                        vec![Solution::from([(
                            "token".to_string(),
                            RdfTerm::literal(literal),
                        )])]
                    })
                    .unwrap_or_default()
            }
            QueryKind::Params => {
                let client = bound(query, "client")?;
                data.clients
                    .get(client)
                    .map(|record| {
                        record
                            .params
                            .iter()
                            .rev()
                            .map(|(option, value)| {
                                Solution::from([
                                    ("option".to_string(), RdfTerm::literal(option)),
                                    ("value".to_string(), RdfTerm::literal(value)),
                                ])
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            QueryKind::ClientsOfType => {
                let rdf_type = bound(query, "client_type")?;
                data.clients
                    .values()
                    .filter(|record| record.has_type(rdf_type))
                    .flat_map(|record| {
                        data.tokens
                            .iter()
                            .filter(move |((_, client), _)| *client == record.iri)
                            .map(move |(_, literal)| {
                                Solution::from([
                                    ("item".to_string(), RdfTerm::Iri(record.iri.clone())),
                                    ("token".to_string(), RdfTerm::literal(literal)),
                                ])
                            })
                    })
                    .collect()
            }
            QueryKind::UpdateToken => {
                return Err(BrokerError::BadRequest(
                    "update statement sent as query".to_string(),
                )
                .into())
            }
        };

        Ok(rows)
    }

    async fn update(&self, update: &PreparedQuery) -> Result<()> {
        let mut data = self.begin(update)?;

        if update.kind() != QueryKind::UpdateToken {
            return Err(BrokerError::BadRequest(format!(
                "{:?} query sent as update",
                update.kind()
            ))
            .into());
        }

        let key = (
            bound(update, "graph")?.to_string(),
            bound(update, "client")?.to_string(),
        );
        let literal = bound(update, "token")?.to_string();
        data.tokens.insert(key, literal);
        Ok(())
    }
}
