//! Flat-file persistence backend
//!
//! Each registration is a `.json`, `.yaml` or `.yml` file directly inside a
//! configuration directory. The file stem is the registration identifier, so
//! `svc-a.json` is looked up as `svc-a`. Tokens live next to the registration
//! in `<file>.token`, e.g. `svc-a.json.token`.
//!
//! Registration file shape:
//!
//! ```json
//! {
//!   "label": "Service A",
//!   "clientid": "abc",
//!   "clientsecret": "xyz",
//!   "authurl": "https://idp.example/auth",
//!   "tokenurl": "https://idp.example/token",
//!   "params": { "access_type": "offline" }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};
use crate::oauth::{AuthParams, Config, OAuthClient, OAuthToken, Provider, Registration, TokenPersistence};

/// Recognized registration file extensions, matched case-insensitively.
const REGISTRATION_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Suffix appended to a registration path to form its token file.
const TOKEN_SUFFIX: &str = ".token";

// ---------------------------------------------------------------------------
// RegistrationFile
// ---------------------------------------------------------------------------

/// On-disk registration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationFile {
    /// Display name; defaults to the identifier when empty.
    #[serde(default)]
    pub label: String,
    pub clientid: String,
    #[serde(default)]
    pub clientsecret: String,
    pub authurl: String,
    pub tokenurl: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl RegistrationFile {
    /// Parses a registration according to the file's extension.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let parsed = if has_extension(path, "json") {
            serde_json::from_str(contents).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|e| {
            BrokerError::Decode(format!("invalid registration file {}: {e}", path.display())).into()
        })
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

fn is_registration_file(path: &Path) -> bool {
    REGISTRATION_EXTENSIONS
        .iter()
        .any(|ext| has_extension(path, ext))
}

// ---------------------------------------------------------------------------
// DirectoryProvider
// ---------------------------------------------------------------------------

/// [`Provider`] over a directory of registration files.
///
/// # Examples
///
/// ```no_run
/// use authbroker::oauth::Provider;
/// use authbroker::persistence::file::DirectoryProvider;
///
/// # async fn example() -> authbroker::Result<()> {
/// let provider = DirectoryProvider::new(
///     "/etc/authbroker/clients",
///     "http://localhost:8083/verify",
///     reqwest::Client::new(),
/// );
/// for config in provider.list_configs().await? {
///     println!("{}", config.label());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    directory: PathBuf,
    redirect_url: String,
    http: reqwest::Client,
}

impl DirectoryProvider {
    pub fn new(
        directory: impl Into<PathBuf>,
        redirect_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            directory: directory.into(),
            redirect_url: redirect_url.into(),
            http,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Lists `(identifier, path)` for every registration file, sorted.
    ///
    /// When two files share a stem, the first in file-name order wins.
    async fn registration_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(|e| {
            BrokerError::BackendUnavailable(format!(
                "cannot read configuration directory {}: {e}",
                self.directory.display()
            ))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BrokerError::BackendUnavailable(e.to_string()))?
        {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && is_registration_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!("Skipping registration with non UTF-8 name: {}", path.display());
                continue;
            };
            if let Some(existing) = files.get(stem) {
                tracing::warn!(
                    "Skipping {}: identifier '{}' already defined by {}",
                    path.display(),
                    stem,
                    existing.display()
                );
                continue;
            }
            files.insert(stem.to_string(), path);
        }

        Ok(files.into_iter().collect())
    }

    async fn load(&self, identifier: &str, path: &Path) -> Result<Registration> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            BrokerError::BackendUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let record = RegistrationFile::parse(path, &contents)?;

        let label = if record.label.is_empty() {
            identifier.to_string()
        } else {
            record.label
        };
        let client = OAuthClient::new(
            self.http.clone(),
            record.clientid,
            record.clientsecret,
            self.redirect_url.clone(),
            record.authurl,
            record.tokenurl,
        );

        Ok(Registration::new(identifier, label, client)
            .with_source(path.to_string_lossy())
            .with_params(AuthParams::from_pairs(record.params)))
    }
}

/// Identifiers are bare file stems; anything that could address a path
/// outside the directory is rejected before touching the filesystem.
fn is_plain_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.starts_with('.')
        && !identifier.contains(['/', '\\', '\0'])
}

#[async_trait]
impl Provider for DirectoryProvider {
    async fn list_configs(&self) -> Result<Vec<Arc<dyn Config>>> {
        let mut configs: Vec<Arc<dyn Config>> = Vec::new();
        for (identifier, path) in self.registration_files().await? {
            match self.load(&identifier, &path).await {
                Ok(registration) => configs.push(Arc::new(registration)),
                Err(e) => tracing::warn!("Skipping registration {}: {:#}", path.display(), e),
            }
        }
        tracing::debug!(
            "Loaded {} registrations from {}",
            configs.len(),
            self.directory.display()
        );
        Ok(configs)
    }

    async fn lookup_config(&self, identifier: &str) -> Result<Arc<dyn Config>> {
        if !is_plain_identifier(identifier) {
            return Err(BrokerError::NotFound(identifier.to_string()).into());
        }

        let path = self
            .registration_files()
            .await?
            .into_iter()
            .find(|(stem, _)| stem == identifier)
            .map(|(_, path)| path)
            .ok_or_else(|| BrokerError::NotFound(identifier.to_string()))?;

        Ok(Arc::new(self.load(identifier, &path).await?))
    }

    fn token_store_for(&self, config: &dyn Config) -> Box<dyn TokenPersistence> {
        let mut path = config.source().to_string();
        path.push_str(TOKEN_SUFFIX);
        Box::new(TokenFile::new(path))
    }
}

// ---------------------------------------------------------------------------
// TokenFile
// ---------------------------------------------------------------------------

/// [`TokenPersistence`] backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        use rand::RngCore as _;
        let suffix = rand::rng().next_u32();
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{suffix:08x}.tmp"));
        PathBuf::from(name)
    }
}

#[async_trait]
impl TokenPersistence for TokenFile {
    async fn current_token(&self) -> Result<Option<OAuthToken>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BrokerError::BackendUnavailable(format!(
                    "cannot read token file {}: {e}",
                    self.path.display()
                ))
                .into())
            }
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let token = serde_json::from_slice(&data).map_err(|e| {
            BrokerError::Decode(format!("malformed token file {}: {e}", self.path.display()))
        })?;
        Ok(Some(token))
    }

    async fn set_token(&self, token: &OAuthToken) -> Result<()> {
        let json = token.to_json()?;
        let temp = self.temp_path();

        let write = async {
            tokio::fs::write(&temp, json.as_bytes()).await?;
            tokio::fs::rename(&temp, &self.path).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(BrokerError::BackendUnavailable(format!(
                "cannot write token file {}: {e}",
                self.path.display()
            ))
            .into());
        }

        tracing::debug!("Stored token in {}", self.path.display());
        Ok(())
    }
}
