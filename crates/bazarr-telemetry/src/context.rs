//! Application span helpers.
//!
//! # Design
//! - Provides an application-level span guard so every event carries mode and build info.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the application-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "bazarr",
            mode = %mode,
            build_sha = %build_sha()
        )));
        let guard = span.enter();
        Self { _guard: guard }
    }
}
