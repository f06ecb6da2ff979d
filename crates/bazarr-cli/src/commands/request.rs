use serde_json::Value;

use crate::cli::{OutputFormat, RequestArgs};
use crate::client::{AppContext, CliResult, classify_api_error};
use crate::output::render_response;

pub(crate) async fn handle_request(
    ctx: &AppContext,
    args: RequestArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let rendered = execute_request(ctx, &args, format).await?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(())
}

pub(crate) async fn execute_request(
    ctx: &AppContext,
    args: &RequestArgs,
    format: OutputFormat,
) -> CliResult<String> {
    let mut request = ctx
        .client
        .request(args.method.as_method(), &args.path)
        .map_err(classify_api_error)?;
    for (key, value) in &args.query {
        request = request.query(key, value);
    }
    if let Some(body) = &args.data {
        request = request.json(body).map_err(classify_api_error)?;
    }

    let response = ctx.client.send(request).await.map_err(classify_api_error)?;
    render_response(&response, format)
}

/// Parse a `key=value` query pair.
pub(crate) fn parse_query_pair(input: &str) -> Result<(String, String), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("query parameter '{input}' must be in key=value form"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("query parameter '{input}' has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse the JSON document passed with `--data`.
pub(crate) fn parse_json_body(input: &str) -> Result<Value, String> {
    serde_json::from_str(input).map_err(|err| format!("request body is not valid JSON: {err}"))
}
