//! Recording doubles for the client's dispatch and error-handling seams.

use std::sync::{Arc, Mutex, PoisonError};

use bazarr_api::{AppAction, Dispatch, ErrorHandler, StatusCode};

/// Dispatcher that keeps every action it receives.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    actions: Mutex<Vec<AppAction>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder behind an `Arc`, ready to hand to a client.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the recorded actions in arrival order.
    #[must_use]
    pub fn actions(&self) -> Vec<AppAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `action` was dispatched.
    #[must_use]
    pub fn count(&self, action: AppAction) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|seen| **seen == action)
            .count()
    }
}

impl Dispatch for RecordingDispatcher {
    fn dispatch(&self, action: AppAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}

/// Error handler that records each status and optionally forwards it.
#[derive(Default)]
pub struct RecordingErrorHandler {
    statuses: Mutex<Vec<StatusCode>>,
    inner: Option<Arc<dyn ErrorHandler>>,
}

impl RecordingErrorHandler {
    /// Recorder that does nothing besides recording.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Recorder that forwards every status to `inner` after recording it.
    #[must_use]
    pub fn wrapping(inner: Arc<dyn ErrorHandler>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(Vec::new()),
            inner: Some(inner),
        })
    }

    /// Snapshot of the recorded statuses in arrival order.
    #[must_use]
    pub fn statuses(&self) -> Vec<StatusCode> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn handle_error(&self, status: StatusCode) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status);
        if let Some(inner) = &self.inner {
            inner.handle_error(status);
        }
    }
}
