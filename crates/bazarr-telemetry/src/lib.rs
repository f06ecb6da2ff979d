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

//! Telemetry primitives shared across the Bazarr client workspace.
//!
//! Layout: `init.rs` (subscriber installation and build identifier),
//! `context.rs` (application span guard), `error.rs` (error types).

pub mod context;
pub mod error;
pub mod init;

pub use context::GlobalContextGuard;
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_config,
};
