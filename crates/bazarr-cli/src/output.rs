//! Output renderers for CLI commands.

use anyhow::anyhow;
use bazarr_api::ApiResponse;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Render a response body for printing.
///
/// JSON bodies are pretty-printed; anything else is printed verbatim.
pub(crate) fn render_response(response: &ApiResponse, format: OutputFormat) -> CliResult<String> {
    let body = render_body(response)?;
    match format {
        OutputFormat::Json => Ok(body),
        OutputFormat::Pretty => {
            let mut text = format!("status: {}\nurl: {}", response.status(), response.url());
            if !body.is_empty() {
                text.push_str("\n\n");
                text.push_str(&body);
            }
            Ok(text)
        }
    }
}

fn render_body(response: &ApiResponse) -> CliResult<String> {
    let text = response.text();
    if text.trim().is_empty() {
        return Ok(String::new());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        Err(_) => Ok(text.trim_end().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazarr_api::{StatusCode, Url};

    fn response(code: u16, body: &str) -> ApiResponse {
        ApiResponse::from_parts(
            StatusCode::from_u16(code).expect("valid status"),
            Default::default(),
            Url::parse("http://127.0.0.1:6767/api/badges").expect("static url"),
            body.as_bytes().to_vec(),
        )
    }

    #[test]
    fn json_output_pretty_prints_body() -> anyhow::Result<()> {
        let rendered = render_response(&response(200, r#"{"movies":3}"#), OutputFormat::Json)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(rendered, "{\n  \"movies\": 3\n}");
        Ok(())
    }

    #[test]
    fn pretty_output_includes_status_and_url() -> anyhow::Result<()> {
        let rendered = render_response(&response(200, "ok\n"), OutputFormat::Pretty)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(
            rendered,
            "status: 200 OK\nurl: http://127.0.0.1:6767/api/badges\n\nok"
        );
        Ok(())
    }

    #[test]
    fn empty_bodies_render_nothing() -> anyhow::Result<()> {
        let rendered = render_response(&response(204, ""), OutputFormat::Json)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(rendered.is_empty());

        let rendered = render_response(&response(204, ""), OutputFormat::Pretty)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(
            rendered,
            "status: 204 No Content\nurl: http://127.0.0.1:6767/api/badges"
        );
        Ok(())
    }
}
