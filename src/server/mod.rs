//! HTTP surface of the broker
//!
//! Three routes, all `GET`:
//!
//! - `/`        -- dashboard of registrations and token health
//! - `/auth`    -- `?id=<identifier>`, starts a flow with a 307 redirect
//! - `/verify`  -- redirect target of the authorization server
//!
//! Errors are rendered as plain text with the status chosen by
//! [`BrokerError::status_code`](crate::error::BrokerError::status_code).

pub mod dashboard;
pub mod favicon;
pub mod flow;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::error::{status_for, BrokerError, Result};
use crate::oauth::Provider;

use self::favicon::FaviconService;
use self::flow::{Callback, FlowEngine};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<FlowEngine>,
    favicon: Option<Arc<dyn FaviconService>>,
}

impl AppState {
    pub fn new(engine: Arc<FlowEngine>, favicon: Option<Arc<dyn FaviconService>>) -> Self {
        Self { engine, favicon }
    }

    pub fn engine(&self) -> &Arc<FlowEngine> {
        &self.engine
    }

    fn provider(&self) -> &Arc<dyn Provider> {
        self.engine.provider()
    }
}

/// Builds the broker router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth", get(authenticate))
        .route("/verify", get(verify))
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| BrokerError::Config(format!("cannot listen on {addr}: {e}")))?;
    let local: SocketAddr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Plain-text error response wrapping any handler failure.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {:#}", self.0);
        } else {
            tracing::debug!("Request rejected ({}): {:#}", status, self.0);
        }
        (status, format!("{:#}", self.0)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<AppState>) -> std::result::Result<Html<String>, ApiError> {
    let entries = dashboard::collect_entries(state.provider().as_ref()).await?;
    Ok(Html(dashboard::render(&entries, state.favicon.as_deref())))
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    #[serde(default)]
    id: Option<String>,
}

async fn authenticate(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> std::result::Result<Redirect, ApiError> {
    let id = query.id.unwrap_or_default();
    let url = state.engine.authenticate(&id).await?;
    Ok(Redirect::temporary(url.as_str()))
}

async fn verify(
    State(state): State<AppState>,
    Query(callback): Query<Callback>,
) -> std::result::Result<&'static str, ApiError> {
    state.engine.verify(&callback).await?;
    Ok("Auth successful")
}
