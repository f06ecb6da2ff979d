//! Request and response interceptor seams.
//!
//! # Design
//! - Request interceptors run in registration order before the request is sent.
//! - Response interceptors run in registration order over the outcome of the
//!   exchange. Each sees either the response (`on_response`) or the error
//!   (`on_error`) left by the previous interceptor. An error raised by one
//!   interceptor's `on_response` is only seen by the interceptors after it.
//! - Failures of request interceptors enter the response chain as errors.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::cancel::CancellationSource;
use crate::client::REQUEST_ID_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::message::{ApiRequest, ApiResponse};

/// Hook applied to every outgoing request.
pub trait RequestInterceptor: Send + Sync {
    /// Inspect or modify the request before it is sent.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the request; the error is passed to the response chain.
    fn intercept(&self, request: &mut ApiRequest) -> ApiResult<()>;
}

/// Hook applied to every exchange outcome.
pub trait ResponseInterceptor: Send + Sync {
    /// Handle a response left by the previous interceptor.
    ///
    /// # Errors
    ///
    /// Returning an error turns the outcome into a failure for the rest of the chain.
    fn on_response(&self, response: ApiResponse) -> ApiResult<ApiResponse> {
        Ok(response)
    }

    /// Handle an error left by the previous interceptor.
    fn on_error(&self, error: ApiError) -> ApiError {
        error
    }
}

/// Ordered interceptor chains owned by a client.
#[derive(Clone, Default)]
pub(crate) struct InterceptorChain {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorChain {
    pub(crate) fn push_request(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    pub(crate) fn push_response(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    pub(crate) fn apply_request(&self, request: &mut ApiRequest) -> ApiResult<()> {
        for interceptor in &self.request {
            interceptor.intercept(request)?;
        }
        Ok(())
    }

    pub(crate) fn apply_response(&self, outcome: ApiResult<ApiResponse>) -> ApiResult<ApiResponse> {
        self.response
            .iter()
            .fold(outcome, |outcome, interceptor| match outcome {
                Ok(response) => interceptor.on_response(response),
                Err(error) => Err(interceptor.on_error(error)),
            })
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        (self.request.len(), self.response.len())
    }
}

/// Stamps every request with the client's current cancellation token.
pub(crate) struct CancellationStamp {
    source: CancellationSource,
}

impl CancellationStamp {
    pub(crate) const fn new(source: CancellationSource) -> Self {
        Self { source }
    }
}

impl RequestInterceptor for CancellationStamp {
    fn intercept(&self, request: &mut ApiRequest) -> ApiResult<()> {
        request.set_cancellation(self.source.token());
        Ok(())
    }
}

/// Applies the client's default headers at send time. Headers the caller set
/// on the request win.
pub(crate) struct DefaultHeaderStamp {
    headers: Arc<RwLock<HeaderMap>>,
}

impl DefaultHeaderStamp {
    pub(crate) const fn new(headers: Arc<RwLock<HeaderMap>>) -> Self {
        Self { headers }
    }
}

impl RequestInterceptor for DefaultHeaderStamp {
    fn intercept(&self, request: &mut ApiRequest) -> ApiResult<()> {
        let defaults = self.headers.read().unwrap_or_else(PoisonError::into_inner);
        for (name, value) in defaults.iter() {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Adds an `x-request-id` header unless the caller already set one.
pub(crate) struct RequestIdStamp;

impl RequestInterceptor for RequestIdStamp {
    fn intercept(&self, request: &mut ApiRequest) -> ApiResult<()> {
        if request.headers().contains_key(REQUEST_ID_HEADER) {
            return Ok(());
        }
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).map_err(|source| {
            ApiError::InvalidHeader {
                name: REQUEST_ID_HEADER,
                source,
            }
        })?;
        request.headers_mut().insert(REQUEST_ID_HEADER, value);
        Ok(())
    }
}
