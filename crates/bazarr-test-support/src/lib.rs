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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (settings and address helpers), mocks.rs (recording dispatcher and error handler).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{client_for, settings_for, unreachable_origin};
pub use mocks::{RecordingDispatcher, RecordingErrorHandler};
