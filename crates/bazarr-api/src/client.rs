//! The shared API client.
//!
//! # Design
//! - One client per host process, cloned into every consumer (`Arc` inside).
//! - The dispatcher is injected at construction; there is no late binding.
//! - The API key lives in a header map behind a lock so it can be rotated in
//!   development without rebuilding the transport. It is applied when a
//!   request is sent, not when it is prepared.
//! - All requests share one cancellation source.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::cancel::CancellationSource;
use crate::config::{AUTH_NEEDED, ClientSettings, RuntimeMode, with_trailing_slash};
use crate::dispatch::Dispatch;
use crate::error::{ApiError, ApiResult};
use crate::interceptor::{
    CancellationStamp, DefaultHeaderStamp, InterceptorChain, RequestIdStamp, RequestInterceptor,
    ResponseInterceptor,
};
use crate::message::{ApiRequest, ApiResponse};
use crate::policy::{AuthRedirectPolicy, ErrorHandler, StatusPolicy};

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying a per-request correlation identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared client for the Bazarr backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    base_url: Url,
    mode: RuntimeMode,
    default_headers: Arc<RwLock<HeaderMap>>,
    cancellation: CancellationSource,
    chain: InterceptorChain,
    error_handler: Arc<dyn ErrorHandler>,
}

/// Builder for [`ApiClient`] allowing extra interceptors or a replacement error handler.
pub struct ApiClientBuilder {
    settings: ClientSettings,
    dispatcher: Arc<dyn Dispatch>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ApiClientBuilder {
    /// Start from resolved settings and the host's dispatcher.
    #[must_use]
    pub fn new(settings: ClientSettings, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            settings,
            dispatcher,
            error_handler: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    /// Replace the default [`AuthRedirectPolicy`].
    #[must_use]
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Register a request interceptor; it runs after the built-in ones.
    #[must_use]
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Register a response interceptor; it runs after the status policy.
    #[must_use]
    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    /// Initialise the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// transport cannot be built.
    pub fn build(self) -> ApiResult<ApiClient> {
        ApiClient::from_builder(self)
    }
}

impl ApiClient {
    /// Construct the client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// transport cannot be built.
    pub fn new(settings: &ClientSettings, dispatcher: Arc<dyn Dispatch>) -> ApiResult<Self> {
        ApiClientBuilder::new(settings.clone(), dispatcher).build()
    }

    /// Start a builder from resolved settings.
    #[must_use]
    pub fn builder(settings: ClientSettings, dispatcher: Arc<dyn Dispatch>) -> ApiClientBuilder {
        ApiClientBuilder::new(settings, dispatcher)
    }

    /// Initialise a client bound to `url` with an optional key.
    ///
    /// A missing key is sent as [`AUTH_NEEDED`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value or the
    /// transport cannot be built.
    pub fn initialize(
        url: Url,
        api_key: Option<&str>,
        mode: RuntimeMode,
        dispatcher: Arc<dyn Dispatch>,
    ) -> ApiResult<Self> {
        let settings = ClientSettings::new(url, api_key.map(str::to_string), mode);
        ApiClientBuilder::new(settings, dispatcher).build()
    }

    fn from_builder(builder: ApiClientBuilder) -> ApiResult<Self> {
        let ApiClientBuilder {
            settings,
            dispatcher,
            error_handler,
            request_interceptors,
            response_interceptors,
        } = builder;

        let mut http = Client::builder();
        if let Some(timeout) = settings.timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;

        let base_url = with_trailing_slash(settings.base_url.clone());
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key_value(settings.effective_api_key())?);
        let default_headers = Arc::new(RwLock::new(headers));

        let cancellation = CancellationSource::new();
        let error_handler: Arc<dyn ErrorHandler> = match error_handler {
            Some(handler) => handler,
            None => Arc::new(AuthRedirectPolicy::new(dispatcher)),
        };

        let mut chain = InterceptorChain::default();
        chain.push_request(Arc::new(CancellationStamp::new(cancellation.clone())));
        chain.push_request(Arc::new(DefaultHeaderStamp::new(Arc::clone(&default_headers))));
        chain.push_request(Arc::new(RequestIdStamp));
        for interceptor in request_interceptors {
            chain.push_request(interceptor);
        }
        chain.push_response(Arc::new(StatusPolicy::new(Arc::clone(&error_handler))));
        for interceptor in response_interceptors {
            chain.push_response(interceptor);
        }

        info!(
            base_url = %base_url,
            mode = %settings.mode,
            authenticated = settings.api_key.is_some(),
            "api client initialised"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                mode: settings.mode,
                default_headers,
                cancellation,
                chain,
                error_handler,
            }),
        })
    }

    /// API root every request path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Runtime mode the client was initialised with.
    #[must_use]
    pub fn mode(&self) -> RuntimeMode {
        self.inner.mode
    }

    /// Current value of the `X-API-KEY` header.
    #[must_use]
    pub fn api_key_header(&self) -> Option<String> {
        self.read_headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Replace the API key on the live client. Ignored in production mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value.
    pub fn reset_api(&self, api_key: &str) -> ApiResult<()> {
        if self.inner.mode.is_production() {
            debug!("api key reset ignored in production mode");
            return Ok(());
        }
        let value = api_key_value(api_key)?;
        self.write_headers().insert(API_KEY_HEADER, value);
        info!("api key header replaced");
        Ok(())
    }

    /// Run the status policy for `status`.
    pub fn handle_error(&self, status: reqwest::StatusCode) {
        self.inner.error_handler.handle_error(status);
    }

    /// Abort every in-flight request. Requests sent afterwards fail with
    /// [`ApiError::Cancelled`] until a new client is initialised.
    pub fn cancel_all(&self) {
        self.inner.cancellation.cancel();
        info!("cancelled all requests");
    }

    /// Whether [`Self::cancel_all`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Prepare a request for `path`, relative to the API root.
    ///
    /// The client's default headers are applied when the request is sent, so a
    /// key rotated in between is picked up. Headers set on the request win.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base URL.
    pub fn request(&self, method: Method, path: &str) -> ApiResult<ApiRequest> {
        let url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ApiError::InvalidPath {
                path: path.to_string(),
                source,
            })?;
        let mut headers = HeaderMap::new();
        if is_write(&method) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        Ok(ApiRequest::new(method, url, headers))
    }

    /// Send a prepared request through the interceptor chains.
    ///
    /// # Errors
    ///
    /// Returns an error for non-2xx statuses, transport failures and cancellation.
    pub async fn send(&self, mut request: ApiRequest) -> ApiResult<ApiResponse> {
        let outcome = match self.inner.chain.apply_request(&mut request) {
            Ok(()) => self.exchange(request).await,
            Err(error) => Err(error),
        };
        self.inner.chain.apply_response(outcome)
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`Self::send`]; also fails if the body does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let request = self.request(Method::GET, path)?;
        self.send(request).await?.json()
    }

    /// `GET` a JSON resource with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Self::send`]; also fails if the body does not decode as `T`.
    pub async fn get_query<T, I, K, V>(&self, path: &str, query: I) -> ApiResult<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = self.request(Method::GET, path)?;
        for (key, value) in query {
            request = request.query(key.as_ref(), value);
        }
        self.send(request).await?.json()
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::send`]; also fails if the body does not encode or the response does not decode.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body)).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::post`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    /// `PATCH` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::post`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, Some(body)).await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// See [`Self::send`]; also fails if the body does not decode as `T`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_json::<(), T>(Method::DELETE, path, None).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request.json(body)?;
        }
        self.send(request).await?.json()
    }

    async fn exchange(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let started = Instant::now();
        let (method, url, headers, body, cancellation) = request.into_parts();

        let mut builder = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let exchange = async {
            let response = builder.send().await.map_err(ApiError::transport)?;
            ApiResponse::read(response).await
        };

        let outcome = match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(ApiError::Cancelled),
                    outcome = exchange => outcome,
                }
            }
            None => exchange.await,
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            Ok(response) => debug!(
                method = %method,
                url = %url,
                status = response.status().as_u16(),
                elapsed_ms,
                "request completed"
            ),
            Err(error) => debug!(
                method = %method,
                url = %url,
                error = %error,
                elapsed_ms,
                "request failed"
            ),
        }
        outcome
    }

    fn read_headers(&self) -> RwLockReadGuard<'_, HeaderMap> {
        self.inner
            .default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_headers(&self) -> RwLockWriteGuard<'_, HeaderMap> {
        self.inner
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (request, response) = self.inner.chain.counts();
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("mode", &self.inner.mode)
            .field("request_interceptors", &request)
            .field("response_interceptors", &response)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn api_key_value(api_key: &str) -> ApiResult<HeaderValue> {
    let mut value = HeaderValue::from_str(api_key).map_err(|source| ApiError::InvalidHeader {
        name: API_KEY_HEADER,
        source,
    })?;
    value.set_sensitive(api_key != AUTH_NEEDED);
    Ok(value)
}

fn is_write(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::AppAction;
    use std::sync::Mutex;

    fn client(api_key: Option<&str>, mode: RuntimeMode) -> ApiResult<ApiClient> {
        ApiClient::initialize(
            Url::parse("http://x/api/").expect("static url"),
            api_key,
            mode,
            Arc::new(|_action: AppAction| {}),
        )
    }

    #[test]
    fn missing_key_defaults_to_sentinel() -> ApiResult<()> {
        let client = client(None, RuntimeMode::Development)?;
        assert_eq!(client.api_key_header().as_deref(), Some(AUTH_NEEDED));
        let mut request = client.request(Method::GET, "system/status")?;
        client.inner.chain.apply_request(&mut request)?;
        assert_eq!(
            request.headers().get(API_KEY_HEADER),
            Some(&HeaderValue::from_static(AUTH_NEEDED))
        );
        Ok(())
    }

    #[test]
    fn prepared_requests_pick_up_rotated_key() -> ApiResult<()> {
        let client = client(Some("oldkey"), RuntimeMode::Development)?;
        let mut prepared = client.request(Method::GET, "series")?;
        let mut explicit = client.request(Method::GET, "series")?;
        explicit
            .headers_mut()
            .insert(API_KEY_HEADER, HeaderValue::from_static("caller"));

        client.reset_api("newkey")?;
        client.inner.chain.apply_request(&mut prepared)?;
        client.inner.chain.apply_request(&mut explicit)?;

        assert_eq!(
            prepared.headers().get(API_KEY_HEADER),
            Some(&HeaderValue::from_static("newkey"))
        );
        assert_eq!(
            explicit.headers().get(API_KEY_HEADER),
            Some(&HeaderValue::from_static("caller"))
        );
        Ok(())
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_last_segment() -> ApiResult<()> {
        let client = ApiClient::initialize(
            Url::parse("http://x/api").expect("static url"),
            Some("k"),
            RuntimeMode::Development,
            Arc::new(|_action: AppAction| {}),
        )?;
        assert_eq!(client.base_url().as_str(), "http://x/api/");
        assert_eq!(
            client.request(Method::GET, "episodes")?.url().as_str(),
            "http://x/api/episodes"
        );

        let settings = ClientSettings {
            base_url: Url::parse("http://x/bazarr/api").expect("static url"),
            api_key: None,
            mode: RuntimeMode::Development,
            timeout: None,
        };
        let built = ApiClient::new(&settings, Arc::new(|_action: AppAction| {}))?;
        assert_eq!(
            built.request(Method::GET, "/system/status")?.url().as_str(),
            "http://x/bazarr/api/system/status"
        );
        Ok(())
    }

    #[test]
    fn paths_resolve_under_api_root() -> ApiResult<()> {
        let client = client(Some("k"), RuntimeMode::Development)?;
        assert_eq!(
            client.request(Method::GET, "/episodes")?.url().as_str(),
            "http://x/api/episodes"
        );
        assert_eq!(
            client.request(Method::GET, "system/languages")?.url().as_str(),
            "http://x/api/system/languages"
        );
        Ok(())
    }

    #[test]
    fn write_methods_carry_json_content_type() -> ApiResult<()> {
        let client = client(Some("k"), RuntimeMode::Development)?;
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            let request = client.request(method, "movies")?;
            assert_eq!(
                request.headers().get(CONTENT_TYPE),
                Some(&HeaderValue::from_static(JSON_CONTENT_TYPE))
            );
        }
        for method in [Method::GET, Method::DELETE] {
            let request = client.request(method, "movies")?;
            assert!(request.headers().get(CONTENT_TYPE).is_none());
        }
        Ok(())
    }

    #[test]
    fn reset_api_only_applies_in_development() -> ApiResult<()> {
        let dev = client(Some("old"), RuntimeMode::Development)?;
        dev.reset_api("newkey")?;
        assert_eq!(dev.api_key_header().as_deref(), Some("newkey"));

        let prod = client(Some("old"), RuntimeMode::Production)?;
        prod.reset_api("newkey")?;
        assert_eq!(prod.api_key_header().as_deref(), Some("old"));
        Ok(())
    }

    #[test]
    fn invalid_keys_are_rejected() {
        assert!(matches!(
            client(Some("bad\nkey"), RuntimeMode::Development),
            Err(ApiError::InvalidHeader { name: API_KEY_HEADER, .. })
        ));
        let Ok(dev) = client(Some("ok"), RuntimeMode::Development) else {
            panic!("valid key must build");
        };
        assert!(dev.reset_api("bad\nkey").is_err());
        assert_eq!(dev.api_key_header().as_deref(), Some("ok"));
    }

    #[test]
    fn clones_share_state() -> ApiResult<()> {
        let original = client(Some("old"), RuntimeMode::Development)?;
        let consumer = original.clone();
        original.reset_api("rotated")?;
        assert_eq!(consumer.api_key_header().as_deref(), Some("rotated"));

        consumer.cancel_all();
        assert!(original.is_cancelled());
        Ok(())
    }

    #[test]
    fn handle_error_delegates_to_configured_handler() -> ApiResult<()> {
        struct Seen(Mutex<Vec<u16>>);
        impl ErrorHandler for Seen {
            fn handle_error(&self, status: reqwest::StatusCode) {
                self.0.lock().expect("seen mutex").push(status.as_u16());
            }
        }

        let seen = Arc::new(Seen(Mutex::new(Vec::new())));
        let settings = ClientSettings::new(
            Url::parse("http://x/api/").expect("static url"),
            None,
            RuntimeMode::Development,
        );
        let client = ApiClient::builder(settings, Arc::new(|_action: AppAction| {}))
            .error_handler(seen.clone())
            .build()?;

        client.handle_error(reqwest::StatusCode::UNAUTHORIZED);
        client.handle_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(*seen.0.lock().expect("seen mutex"), vec![401, 500]);
        Ok(())
    }

    #[test]
    fn debug_output_hides_key() -> ApiResult<()> {
        let client = client(Some("top-secret"), RuntimeMode::Development)?;
        let rendered = format!("{client:?}");
        assert!(rendered.contains("http://x/api/"));
        assert!(!rendered.contains("top-secret"));
        Ok(())
    }
}
