//! Configuration management for authbroker
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest to highest: built-in defaults, YAML file,
//! `AUTHBROKER_*` environment variables, command-line flags.

use crate::cli::{BackendArgs, Cli, Commands};
use crate::error::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for authbroker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistence backend selection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Authorization flow settings
    #[serde(default)]
    pub flow: FlowConfig,
    /// Dashboard presentation settings
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL of the broker
    ///
    /// Used to build the redirect URL for file-backed registrations. When
    /// unset, `http://localhost:<port>` is used.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Per-request timeout for token endpoints and `fetch` (milliseconds)
    #[serde(default = "default_token_timeout_ms")]
    pub token_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8083
}

fn default_token_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            token_timeout_ms: default_token_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Redirect URL registered with authorization servers.
    pub fn redirect_url(&self) -> String {
        match self.public_url.as_deref() {
            Some(base) if !base.is_empty() => format!("{}/verify", base.trim_end_matches('/')),
            _ => format!("http://localhost:{}/verify", self.port),
        }
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.token_timeout_ms)
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Persistence backend configuration
///
/// Exactly one of `directory` and `repository_url` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Directory of registration files
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// SPARQL query endpoint, optionally with `user:password@` credentials
    #[serde(default)]
    pub repository_url: Option<String>,

    /// SPARQL update endpoint when it differs from the query endpoint
    #[serde(default)]
    pub update_url: Option<String>,

    /// Per-request timeout for the triple store (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1500
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            directory: None,
            repository_url: None,
            update_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Authorization flow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Seconds a pending flow stays valid before its state is discarded
    #[serde(default = "default_state_ttl_seconds")]
    pub state_ttl_seconds: u64,
}

fn default_state_ttl_seconds() -> u64 {
    600
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: default_state_ttl_seconds(),
        }
    }
}

impl FlowConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_seconds)
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Favicon service base URL (faviconkit only)
    #[serde(default)]
    pub favicon_service: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| BrokerError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("AUTHBROKER_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("AUTHBROKER_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid AUTHBROKER_PORT: {}", port);
            }
        }

        if let Ok(public_url) = std::env::var("AUTHBROKER_PUBLIC_URL") {
            self.server.public_url = Some(public_url);
        }

        if let Ok(timeout) = std::env::var("AUTHBROKER_TOKEN_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse() {
                self.server.token_timeout_ms = value;
            } else {
                tracing::warn!("Invalid AUTHBROKER_TOKEN_TIMEOUT_MS: {}", timeout);
            }
        }

        if let Ok(dir) = std::env::var("AUTHBROKER_CONFIG_DIR") {
            self.backend.directory = Some(PathBuf::from(dir));
        }

        if let Ok(repository) = std::env::var("AUTHBROKER_REPOSITORY") {
            self.backend.repository_url = Some(repository);
        }

        if let Ok(update_url) = std::env::var("AUTHBROKER_UPDATE_URL") {
            self.backend.update_url = Some(update_url);
        }

        if let Ok(timeout) = std::env::var("AUTHBROKER_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse() {
                self.backend.timeout_ms = value;
            } else {
                tracing::warn!("Invalid AUTHBROKER_TIMEOUT_MS: {}", timeout);
            }
        }

        if let Ok(ttl) = std::env::var("AUTHBROKER_STATE_TTL_SECONDS") {
            if let Ok(value) = ttl.parse() {
                self.flow.state_ttl_seconds = value;
            } else {
                tracing::warn!("Invalid AUTHBROKER_STATE_TTL_SECONDS: {}", ttl);
            }
        }

        if let Ok(favicon) = std::env::var("AUTHBROKER_FAVICON") {
            self.dashboard.favicon_service = Some(favicon);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        match &cli.command {
            Commands::Serve {
                backend,
                host,
                port,
                favicon,
            } => {
                self.apply_backend_args(backend);
                if let Some(host) = host {
                    self.server.host = host.clone();
                }
                if let Some(port) = port {
                    self.server.port = *port;
                }
                if let Some(favicon) = favicon {
                    self.dashboard.favicon_service = Some(favicon.clone());
                }
            }
            Commands::List { backend } | Commands::Fetch { backend, .. } => {
                self.apply_backend_args(backend);
            }
        }
    }

    /// A backend chosen on the command line replaces the configured one.
    fn apply_backend_args(&mut self, args: &BackendArgs) {
        if args.config_dir.is_none() && args.repository.is_none() {
            return;
        }
        self.backend.directory = args.config_dir.clone();
        self.backend.repository_url = args.repository.clone();
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Config`] if any validation check fails
    pub fn validate(&self) -> Result<()> {
        match (&self.backend.directory, &self.backend.repository_url) {
            (None, None) => {
                return Err(BrokerError::Config(
                    "Either a SPARQL repository or a configuration directory must be specified"
                        .to_string(),
                )
                .into());
            }
            (Some(_), Some(_)) => {
                return Err(BrokerError::Config(
                    "Both a SPARQL repository and a configuration directory specified; remove one of them"
                        .to_string(),
                )
                .into());
            }
            _ => {}
        }

        if let Some(repository) = &self.backend.repository_url {
            url::Url::parse(repository)
                .map_err(|e| BrokerError::Config(format!("Invalid repository URL: {}", e)))?;
        }

        if self.server.port == 0 {
            return Err(
                BrokerError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        if self.server.token_timeout_ms == 0 {
            return Err(BrokerError::Config(
                "server.token_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.backend.timeout_ms == 0 {
            return Err(BrokerError::Config(
                "backend.timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.flow.state_ttl_seconds == 0 {
            return Err(BrokerError::Config(
                "flow.state_ttl_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if let Some(service) = &self.dashboard.favicon_service {
            if !service.is_empty() && crate::server::favicon::favicon_service(service).is_none() {
                return Err(BrokerError::Config(format!(
                    "Favicon service not recognized: '{}' (only faviconkit is supported)",
                    service
                ))
                .into());
            }
        }

        Ok(())
    }
}
