//! Persistence backends
//!
//! Two interchangeable [`Provider`] implementations:
//!
//! - [`file`]   -- a directory of registration files with sibling token files
//! - [`sparql`] -- a SPARQL 1.1 triple store

pub mod file;
pub mod sparql;

use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::{BrokerError, Result};
use crate::oauth::Provider;

use self::file::DirectoryProvider;
use self::sparql::{HttpRepository, SparqlProvider};

/// Builds the provider selected by `backend`.
///
/// `redirect_url` is used by file-backed registrations; triple-store
/// registrations carry their own.
///
/// # Errors
///
/// Returns [`BrokerError::Config`] when no backend is selected or the
/// repository URL is invalid.
pub fn open_provider(
    backend: &BackendConfig,
    redirect_url: &str,
    http: reqwest::Client,
) -> Result<Arc<dyn Provider>> {
    if let Some(repository) = &backend.repository_url {
        let repo = HttpRepository::new(repository, backend.update_url.as_deref(), backend.timeout())?;
        tracing::info!("Using SPARQL repository at {}", repo.query_url());
        return Ok(Arc::new(SparqlProvider::new(Arc::new(repo), http)));
    }

    if let Some(directory) = &backend.directory {
        tracing::info!("Using configuration directory {}", directory.display());
        return Ok(Arc::new(DirectoryProvider::new(
            directory.clone(),
            redirect_url,
            http,
        )));
    }

    Err(BrokerError::Config("no persistence backend configured".to_string()).into())
}
