use crate::client::BearerClient;
use crate::config::Config;
use crate::error::{BrokerError, Result};
use crate::persistence::open_provider;

/// GET `url` with the token stored for `config_id` and print the body.
///
/// # Errors
///
/// Fails when the registration is unknown or unauthorized, when the token
/// cannot be refreshed, or when the response status is not a success.
pub async fn run_fetch(config: Config, config_id: String, url: String) -> Result<()> {
    let http = super::http_client(config.server.token_timeout())?;
    let provider = open_provider(&config.backend, &config.server.redirect_url(), http.clone())?;

    let registration = provider.lookup_config(&config_id).await?;
    let store = provider.token_store_for(registration.as_ref());
    let client = BearerClient::new(http, registration, store);

    let resp = client.get(&url).await?;
    let status = resp.status();
    let body = resp.text().await.map_err(BrokerError::from)?;

    if !status.is_success() {
        return Err(BrokerError::BadRequest(format!("GET {url} returned {status}: {body}")).into());
    }

    println!("{body}");
    Ok(())
}
