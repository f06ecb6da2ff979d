//! Settings and address helpers for client tests.

use std::net::TcpListener;
use std::sync::Arc;

use anyhow::{Context, Result};
use bazarr_api::config::api_base_url;
use bazarr_api::{ApiClient, ClientSettings, Dispatch, RuntimeMode};
use url::Url;

/// Origin on the loopback interface where nothing is listening.
///
/// # Errors
///
/// Returns an error if no ephemeral port can be reserved.
pub fn unreachable_origin() -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve a local port")?;
    let port = listener
        .local_addr()
        .context("failed to read the reserved port")?
        .port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}")).context("loopback origin did not parse")
}

/// Settings pointing at `origin` (for example a mock server's base URL).
///
/// # Errors
///
/// Returns an error if `origin` is not a valid backend origin.
pub fn settings_for(
    origin: &str,
    api_key: Option<&str>,
    mode: RuntimeMode,
) -> Result<ClientSettings> {
    let base_url = api_base_url(origin).context("invalid test origin")?;
    Ok(ClientSettings::new(
        base_url,
        api_key.map(str::to_string),
        mode,
    ))
}

/// Client pointing at `origin` with the supplied dispatcher.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the client cannot be built.
pub fn client_for(
    origin: &str,
    api_key: Option<&str>,
    mode: RuntimeMode,
    dispatcher: Arc<dyn Dispatch>,
) -> Result<ApiClient> {
    let settings = settings_for(origin, api_key, mode)?;
    ApiClient::new(&settings, dispatcher).context("failed to build api client")
}
