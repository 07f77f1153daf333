/*!
Command handlers for the CLI

- `serve` -- run the broker HTTP server
- `list`  -- print registrations and token health
- `fetch` -- GET a URL with a registration's stored token
*/

use std::time::Duration;

use crate::error::{BrokerError, Result};

pub mod fetch;
pub mod list;
pub mod serve;

/// Builds the HTTP client shared by the token endpoints and `fetch`.
///
/// Every request is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("authbroker/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(BrokerError::from)?;
    Ok(client)
}
