//! Favicon lookup for dashboard entries

use std::sync::Arc;

use url::Url;

/// Icon size requested from the service, in pixels.
const ICON_SIZE: u32 = 24;

/// Resolves an icon URL for a registration's endpoint.
pub trait FaviconService: Send + Sync {
    /// Icon URL for the host of `endpoint`, or `None` if it has no host.
    fn favicon_src(&self, endpoint: &str) -> Option<String>;
}

/// faviconkit.com: `<base>/<host>/<size>`.
#[derive(Debug, Clone)]
pub struct FaviconKit {
    base: String,
}

impl FaviconKit {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl FaviconService for FaviconKit {
    fn favicon_src(&self, endpoint: &str) -> Option<String> {
        let url = Url::parse(endpoint).ok()?;
        let host = url.host_str()?;
        Some(format!("{}/{}/{}", self.base, host, ICON_SIZE))
    }
}

/// Picks the favicon service for a configured base URL.
///
/// Returns `None` for unrecognized services.
///
/// # Examples
///
/// ```
/// use authbroker::server::favicon::favicon_service;
///
/// let service = favicon_service("https://abc.faviconkit.com").unwrap();
/// assert_eq!(
///     service.favicon_src("https://idp.example/token").as_deref(),
///     Some("https://abc.faviconkit.com/idp.example/24")
/// );
/// assert!(favicon_service("https://icons.example").is_none());
/// ```
pub fn favicon_service(service_url: &str) -> Option<Arc<dyn FaviconService>> {
    if service_url.contains(".faviconkit.com") {
        Some(Arc::new(FaviconKit::new(service_url)))
    } else {
        None
    }
}
