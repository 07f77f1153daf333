//! HTML dashboard listing registrations and token health

use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::Result;
use crate::oauth::{Config, Provider, TokenHealth};
use crate::server::favicon::FaviconService;

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>authbroker</title>
<link rel="stylesheet" href="https://www.w3schools.com/w3css/4/w3.css">
</head>
<body class="w3-container"><ul class="w3-ul w3-card-4 w3-margin" style="max-width:40em">
"#;

const FOOTER: &str = "</ul></body></html>\n";

/// One dashboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardEntry {
    pub identifier: String,
    /// Backend-assigned identifier, e.g. a triple store's `dc:identifier`.
    pub external_id: Option<String>,
    pub label: String,
    pub token_endpoint: String,
    pub health: TokenHealth,
}

/// Reads every registration's token and classifies it.
///
/// Token reads run concurrently; a failed read marks its entry red rather
/// than failing the listing.
pub async fn collect_entries(provider: &dyn Provider) -> Result<Vec<DashboardEntry>> {
    let configs = provider.list_configs().await?;
    let reads = configs.iter().map(|config| async move {
        let store = provider.token_store_for(config.as_ref());
        let read = store.current_token().await;
        if let Err(e) = &read {
            tracing::warn!("Cannot read token for {}: {:#}", config.identifier(), e);
        }
        entry(config, TokenHealth::classify(&read))
    });
    Ok(join_all(reads).await)
}

fn entry(config: &Arc<dyn Config>, health: TokenHealth) -> DashboardEntry {
    DashboardEntry {
        identifier: config.identifier().to_string(),
        external_id: config.external_id().map(str::to_string),
        label: config.label().to_string(),
        token_endpoint: config.token_endpoint().to_string(),
        health,
    }
}

/// Renders the dashboard page.
pub fn render(entries: &[DashboardEntry], favicon: Option<&dyn FaviconService>) -> String {
    let mut html = String::from(HEADER);
    for entry in entries {
        let href: String = url::form_urlencoded::byte_serialize(entry.identifier.as_bytes()).collect();
        // Writing into a String cannot fail.
        let _ = write!(
            html,
            "<a href=\"/auth?id={}\"><li class=\"w3-border {}\"><p>",
            href,
            entry.health.css_class()
        );
        if let Some(src) = favicon.and_then(|f| f.favicon_src(&entry.token_endpoint)) {
            let _ = write!(
                html,
                "<img src=\"{}\" style=\"width:3em;height:3em;\">",
                escape_html(&src)
            );
        }
        let _ = writeln!(html, "{}</p></li></a>", escape_html(&entry.label));
    }
    html.push_str(FOOTER);
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
