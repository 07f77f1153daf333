//! authbroker - OAuth2 authorization broker library
//!
//! This library drives the OAuth2 authorization-code flow for a catalog of
//! client registrations and persists the resulting tokens, so that other
//! tools can make authenticated requests without a browser.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `oauth`: Registration, token, and provider contracts plus the OAuth2 client
//! - `persistence`: Directory-of-files and SPARQL triple-store backends
//! - `server`: Flow engine, dashboard, and the HTTP router
//! - `client`: Bearer-token HTTP client with refresh
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use authbroker::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/authbroker.yaml", &Default::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod oauth;
pub mod persistence;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use error::{BrokerError, Result};

#[cfg(test)]
pub mod test_utils;
