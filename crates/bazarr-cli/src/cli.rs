//! Command-line surface for issuing calls through the Bazarr API client.

use std::path::PathBuf;
use std::sync::Arc;

use bazarr_api::config::{ENV_API_KEY, ENV_BASE_URL, ENV_MODE, ENV_TIMEOUT_SECS};
use bazarr_api::{
    ApiClient, AppAction, ChannelDispatcher, ClientSettings, DEFAULT_BASE_URL, HostGlobals, Method,
};
use bazarr_telemetry::{
    DEFAULT_LOG_LEVEL, GlobalContextGuard, LoggingConfig, init_logging, log_format_from_config,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::client::{AppContext, CliError, CliResult, classify_api_error};
use crate::commands::request::{handle_request, parse_json_body, parse_query_pair};

/// Parses CLI arguments, executes the requested command and reports failures.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: log_format_from_config(cli.log_format.as_deref()),
        build_sha: option_env!("BAZARR_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

pub(crate) async fn execute(cli: Cli) -> CliResult<()> {
    let settings = resolve_settings(&cli)?;
    let _context = GlobalContextGuard::new(settings.mode.as_str());

    let (dispatcher, mut actions) = ChannelDispatcher::new();
    let client = ApiClient::new(&settings, Arc::new(dispatcher)).map_err(classify_api_error)?;
    let ctx = AppContext { client };

    let result = match cli.command {
        Command::Request(args) => handle_request(&ctx, args, cli.output).await,
    };

    if redirect_requested(&mut actions) {
        return Err(CliError::AuthRequired);
    }
    result
}

/// Resolve client settings from flags, with the same rules as the environment lookup.
pub(crate) fn resolve_settings(cli: &Cli) -> CliResult<ClientSettings> {
    let globals = cli
        .globals_file
        .as_deref()
        .map(HostGlobals::load)
        .transpose()?;
    let lookup = |name: &str| match name {
        ENV_MODE => cli.mode.clone(),
        ENV_BASE_URL => Some(cli.base_url.clone()),
        ENV_API_KEY => cli.api_key.clone(),
        ENV_TIMEOUT_SECS => cli.timeout.map(|secs| secs.to_string()),
        _ => None,
    };
    Ok(ClientSettings::from_lookup(lookup, globals.as_ref())?)
}

fn redirect_requested(actions: &mut UnboundedReceiver<AppAction>) -> bool {
    let mut redirected = false;
    while let Ok(action) = actions.try_recv() {
        match action {
            AppAction::RedirectToAuth => {
                info!(action = action.kind(), "host received action");
                redirected = true;
            }
        }
    }
    redirected
}

#[derive(Parser)]
#[command(name = "bazarr", about = "Issue calls against a Bazarr backend")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "BAZARR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub(crate) base_url: String,
    #[arg(long, global = true, env = "BAZARR_APIKEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "BAZARR_MODE",
        help = "Runtime mode; only `production` reads credentials from the globals file"
    )]
    pub(crate) mode: Option<String>,
    #[arg(long, global = true, env = "BAZARR_GLOBALS_FILE")]
    pub(crate) globals_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "BAZARR_HTTP_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Request timeout in seconds; requests wait indefinitely when unset"
    )]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Json,
        help = "Select how response bodies are rendered"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, env = "BAZARR_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "BAZARR_LOG_FORMAT")]
    pub(crate) log_format: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Send one request relative to the API root.
    Request(RequestArgs),
}

#[derive(Args, Debug)]
pub(crate) struct RequestArgs {
    #[arg(value_enum, ignore_case = true)]
    pub(crate) method: HttpMethod,
    /// Path relative to `<base-url>/api/`, for example `system/status`.
    pub(crate) path: String,
    #[arg(long = "query", short = 'q', value_parser = parse_query_pair)]
    pub(crate) query: Vec<(String, String)>,
    #[arg(long, value_parser = parse_json_body)]
    pub(crate) data: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub(crate) const fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Pretty,
}
