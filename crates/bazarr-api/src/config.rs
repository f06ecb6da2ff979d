//! Settings resolution for the shared client.
//!
//! # Design
//! - The hosting application resolves settings once and injects them into the client.
//! - Development reads the API key from the environment; production reads it from
//!   the host-injected globals document.
//! - A missing key falls back to [`AUTH_NEEDED`] so the backend answers `401` and the
//!   auth redirect fires, instead of failing at startup.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Sentinel sent in `X-API-KEY` when no key is available.
pub const AUTH_NEEDED: &str = "AUTH_NEEDED";
/// Backend origin used when neither the host nor the environment supplies one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:6767";

/// Environment variable selecting the runtime mode.
pub const ENV_MODE: &str = "BAZARR_MODE";
/// Environment variable overriding the backend origin.
pub const ENV_BASE_URL: &str = "BAZARR_BASE_URL";
/// Environment variable carrying the development API key.
pub const ENV_API_KEY: &str = "BAZARR_APIKEY";
/// Environment variable pointing at the host globals document.
pub const ENV_GLOBALS_FILE: &str = "BAZARR_GLOBALS_FILE";
/// Environment variable carrying the whole-request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "BAZARR_HTTP_TIMEOUT_SECS";

const API_PATH: &str = "api/";

/// Runtime mode deciding where the API key comes from and whether it may be rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    /// Local development; key from the environment, rotation allowed.
    #[default]
    Development,
    /// Deployed build; key from the host globals, rotation disabled.
    Production,
}

impl RuntimeMode {
    /// Interpret a raw mode value. Only `production` selects production mode.
    #[must_use]
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(raw) if raw.trim().eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Render the mode as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Whether this is production mode.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Values the hosting page or launcher injects at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostGlobals {
    /// API key provisioned by the backend for this host.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Origin the backend is served from.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl HostGlobals {
    /// Parse a globals document.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid globals object.
    pub fn from_json(payload: &str) -> ConfigResult<Self> {
        serde_json::from_str(payload).map_err(|source| ConfigError::GlobalsParse { path: None, source })
    }

    /// Load a globals document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let payload = std::fs::read_to_string(path).map_err(|source| ConfigError::GlobalsRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&payload).map_err(|source| ConfigError::GlobalsParse {
            path: Some(path.to_path_buf()),
            source,
        })
    }
}

/// Fully resolved client settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// API root. Clients treat it as ending in `/` even when it does not.
    pub base_url: Url,
    /// API key, or `None` to send [`AUTH_NEEDED`].
    pub api_key: Option<String>,
    /// Runtime mode.
    pub mode: RuntimeMode,
    /// Optional whole-request timeout.
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientSettings {
    /// Construct settings from already-resolved parts without a timeout.
    ///
    /// A missing trailing `/` is added so the last path segment survives joins.
    #[must_use]
    pub fn new(base_url: Url, api_key: Option<String>, mode: RuntimeMode) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            api_key,
            mode,
            timeout: None,
        }
    }

    /// Resolve settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL, timeout or globals document is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        let globals = match lookup(ENV_GLOBALS_FILE) {
            Some(path) if !path.trim().is_empty() => Some(HostGlobals::load(Path::new(path.trim()))?),
            _ => None,
        };
        Self::from_lookup(lookup, globals.as_ref())
    }

    /// Resolve settings from an arbitrary variable lookup and optional host globals.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout value is invalid.
    pub fn from_lookup<F>(lookup: F, globals: Option<&HostGlobals>) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = RuntimeMode::from_value(lookup(ENV_MODE).as_deref());

        let origin = match mode {
            RuntimeMode::Production => globals
                .and_then(|globals| non_empty(globals.base_url.clone()))
                .or_else(|| non_empty(lookup(ENV_BASE_URL))),
            RuntimeMode::Development => non_empty(lookup(ENV_BASE_URL)),
        }
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = api_base_url(&origin)?;

        let api_key = match mode {
            RuntimeMode::Development => non_empty(lookup(ENV_API_KEY)),
            RuntimeMode::Production => {
                let key = globals.and_then(|globals| non_empty(globals.api_key.clone()));
                if key.is_none() {
                    warn!(
                        sentinel = AUTH_NEEDED,
                        "host globals carry no API key; requests will require authentication"
                    );
                }
                key
            }
        };

        let timeout = match non_empty(lookup(ENV_TIMEOUT_SECS)) {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|source| ConfigError::InvalidTimeout { value: raw.clone(), source })?;
                if secs == 0 {
                    return Err(ConfigError::ZeroTimeout);
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            base_url,
            api_key,
            mode,
            timeout,
        })
    }

    /// Key that will be placed in `X-API-KEY`.
    #[must_use]
    pub fn effective_api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or(AUTH_NEEDED)
    }
}

/// Derive the API root (`<origin>/api/`) from a backend origin.
///
/// # Errors
///
/// Returns an error if the origin does not parse or is not `http`/`https`.
pub fn api_base_url(origin: &str) -> ConfigResult<Url> {
    let trimmed = origin.trim().trim_end_matches('/');
    let root = format!("{trimmed}/");
    let parsed = Url::parse(&root).map_err(|source| ConfigError::InvalidBaseUrl {
        value: origin.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            scheme: parsed.scheme().to_string(),
        });
    }
    if parsed.path().trim_end_matches('/').ends_with("/api") {
        return Ok(parsed);
    }
    parsed.join(API_PATH).map_err(|source| ConfigError::InvalidBaseUrl {
        value: origin.to_string(),
        source,
    })
}

/// Append a trailing `/` to the path when it is missing.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
