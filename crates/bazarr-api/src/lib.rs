#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Shared HTTP client for the Bazarr backend API.
//!
//! One [`ApiClient`] is constructed by the hosting application and cloned into
//! every consumer. It owns the base URL, the `X-API-KEY` header, a single
//! cancellation source shared by all requests, and the status policy that
//! turns a `401` into an [`AppAction::RedirectToAuth`].
//!
//! Layout:
//! - `config.rs`: runtime mode, host globals and settings resolution
//! - `client.rs`: `ApiClient`, its builder and the request verbs
//! - `interceptor.rs`: request/response interceptor seams and built-ins
//! - `policy.rs`: status-code policy and the disconnection rewrite
//! - `dispatch.rs`: application actions and dispatcher implementations
//! - `cancel.rs`: the shared cancellation source
//! - `message.rs`: buffered request/response types
//! - `error.rs`: `ApiError` / `ConfigError`

pub mod cancel;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod interceptor;
pub mod message;
pub mod policy;

pub use cancel::CancellationSource;
pub use client::{API_KEY_HEADER, ApiClient, ApiClientBuilder, REQUEST_ID_HEADER};
pub use config::{AUTH_NEEDED, ClientSettings, DEFAULT_BASE_URL, HostGlobals, RuntimeMode};
pub use dispatch::{AppAction, ChannelDispatcher, Dispatch};
pub use error::{ApiError, ApiResult, ConfigError, ConfigResult};
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use message::{ApiRequest, ApiResponse};
pub use policy::{AuthRedirectPolicy, BACKEND_DISCONNECTED_MESSAGE, ErrorHandler};

pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
