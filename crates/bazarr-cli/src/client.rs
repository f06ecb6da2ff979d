//! Command context, error types and API error classification for the CLI.

use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use bazarr_api::{ApiClient, ApiError, ApiResponse, ConfigError, StatusCode};
use serde_json::Value;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    AuthRequired,
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::AuthRequired => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
            Self::AuthRequired => {
                "authentication required (pass --api-key or set BAZARR_APIKEY)".to_string()
            }
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::Validation(format!("{:#}", anyhow::Error::new(error)))
    }
}

/// Context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: ApiClient,
}

/// Map a client failure onto a CLI error.
pub(crate) fn classify_api_error(error: ApiError) -> CliError {
    match error {
        ApiError::Status { status, response } => classify_status(status, &response),
        ApiError::InvalidPath { .. } | ApiError::InvalidHeader { .. } | ApiError::Encode { .. } => {
            CliError::validation(format!("{:#}", anyhow::Error::new(error)))
        }
        other => CliError::failure(other),
    }
}

fn classify_status(status: StatusCode, response: &ApiResponse) -> CliError {
    let message = problem_message(response);

    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(message.unwrap_or_else(|| format!("request rejected with status {status}")))
    } else {
        let detail = message.map_or_else(
            || format!("request failed with status {status}"),
            |message| format!("{message} (status {status})"),
        );
        CliError::failure(anyhow!(detail))
    }
}

/// Pull a human-readable message out of an error body.
fn problem_message(response: &ApiResponse) -> Option<String> {
    let text = response.text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let structured = serde_json::from_str::<Value>(trimmed).ok().and_then(|value| {
        ["message", "detail", "error"]
            .iter()
            .find_map(|field| value.get(field).and_then(Value::as_str).map(str::to_string))
    });
    Some(structured.unwrap_or_else(|| trimmed.to_string()))
}
