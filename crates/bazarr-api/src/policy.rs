//! Status-code policy applied to every exchange.
//!
//! # Design
//! - `StatusPolicy` is the first response interceptor of every client.
//! - Non-2xx responses and failures carrying a response go through the
//!   [`ErrorHandler`] exactly once and stay failures.
//! - Failures without a response get the fixed disconnection notice as message.
//! - Cancellation is not a connectivity failure and is passed through untouched.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::dispatch::{AppAction, Dispatch};
use crate::error::{ApiError, ApiResult};
use crate::interceptor::ResponseInterceptor;
use crate::message::ApiResponse;

/// Message carried by transport failures once the status policy has seen them.
pub const BACKEND_DISCONNECTED_MESSAGE: &str = "You have disconnected from the Bazarr backend";

/// Decision point turning HTTP status codes into application actions.
pub trait ErrorHandler: Send + Sync {
    /// React to a non-success status.
    fn handle_error(&self, status: StatusCode);
}

/// Default policy: `401` redirects to authentication, everything else is logged only.
pub struct AuthRedirectPolicy {
    dispatcher: Arc<dyn Dispatch>,
}

impl AuthRedirectPolicy {
    /// Build the policy around the host's dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self { dispatcher }
    }
}

impl ErrorHandler for AuthRedirectPolicy {
    fn handle_error(&self, status: StatusCode) {
        match status {
            StatusCode::UNAUTHORIZED => {
                info!(status = status.as_u16(), "credentials rejected; redirecting to authentication");
                self.dispatcher.dispatch(AppAction::RedirectToAuth);
            }
            StatusCode::INTERNAL_SERVER_ERROR => {
                warn!(status = status.as_u16(), "backend reported an internal error");
            }
            _ => {
                debug!(status = status.as_u16(), "request rejected by backend");
            }
        }
    }
}

pub(crate) struct StatusPolicy {
    handler: Arc<dyn ErrorHandler>,
}

impl StatusPolicy {
    pub(crate) fn new(handler: Arc<dyn ErrorHandler>) -> Self {
        Self { handler }
    }
}

impl ResponseInterceptor for StatusPolicy {
    fn on_response(&self, response: ApiResponse) -> ApiResult<ApiResponse> {
        if response.is_success() {
            return Ok(response);
        }
        self.handler.handle_error(response.status());
        Err(ApiError::status(response))
    }

    fn on_error(&self, error: ApiError) -> ApiError {
        if let Some(status) = error.status_code() {
            self.handler.handle_error(status);
            return error;
        }
        if error.is_transport() {
            warn!(error = %error, "backend unreachable");
            return error.with_transport_message(BACKEND_DISCONNECTED_MESSAGE);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<StatusCode>>,
        actions: Mutex<Vec<AppAction>>,
    }

    impl ErrorHandler for Recorder {
        fn handle_error(&self, status: StatusCode) {
            self.statuses.lock().expect("status mutex").push(status);
        }
    }

    impl Dispatch for Recorder {
        fn dispatch(&self, action: AppAction) {
            self.actions.lock().expect("action mutex").push(action);
        }
    }

    fn response(code: u16) -> ApiResponse {
        ApiResponse::from_parts(
            StatusCode::from_u16(code).expect("valid status"),
            HeaderMap::new(),
            Url::parse("http://x/api/movies").expect("static url"),
            b"{}".to_vec(),
        )
    }

    #[test]
    fn success_codes_pass_through_unchanged() {
        let recorder = Arc::new(Recorder::default());
        let policy = StatusPolicy::new(recorder.clone());
        for code in [200_u16, 201, 204, 299] {
            let outcome = policy.on_response(response(code));
            let passed = outcome.expect("2xx must resolve");
            assert_eq!(passed.status().as_u16(), code);
            assert_eq!(passed.body(), b"{}");
        }
        assert!(recorder.statuses.lock().expect("status mutex").is_empty());
    }

    #[test]
    fn other_codes_reject_and_invoke_handler_once_each() {
        let recorder = Arc::new(Recorder::default());
        let policy = StatusPolicy::new(recorder.clone());
        let codes = [300_u16, 304, 400, 401, 403, 404, 500, 503];
        for code in codes {
            let err = policy.on_response(response(code)).expect_err("non-2xx must reject");
            assert_eq!(err.status_code().map(|status| status.as_u16()), Some(code));
        }
        let seen: Vec<u16> = recorder
            .statuses
            .lock()
            .expect("status mutex")
            .iter()
            .map(|status| status.as_u16())
            .collect();
        assert_eq!(seen, codes);
    }

    #[test]
    fn errors_with_response_invoke_handler() {
        let recorder = Arc::new(Recorder::default());
        let policy = StatusPolicy::new(recorder.clone());
        let err = policy.on_error(ApiError::status(response(502)));
        assert_eq!(err.status_code(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(
            *recorder.statuses.lock().expect("status mutex"),
            vec![StatusCode::BAD_GATEWAY]
        );
    }

    #[test]
    fn cancellation_is_left_alone() {
        let recorder = Arc::new(Recorder::default());
        let policy = StatusPolicy::new(recorder.clone());
        let err = policy.on_error(ApiError::Cancelled);
        assert!(err.is_cancelled());
        assert!(recorder.statuses.lock().expect("status mutex").is_empty());
    }

    #[test]
    fn only_unauthorized_dispatches_redirect() {
        let recorder = Arc::new(Recorder::default());
        let policy = AuthRedirectPolicy::new(recorder.clone());
        for code in [400_u16, 403, 404, 500, 502] {
            policy.handle_error(StatusCode::from_u16(code).expect("valid status"));
        }
        assert!(recorder.actions.lock().expect("action mutex").is_empty());

        policy.handle_error(StatusCode::UNAUTHORIZED);
        assert_eq!(
            *recorder.actions.lock().expect("action mutex"),
            vec![AppAction::RedirectToAuth]
        );
    }
}
