//! Buffered request and response types that flow through the interceptor chains.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ApiError, ApiResult};

/// Outgoing request, mutable by request interceptors until it is sent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    cancellation: Option<CancellationToken>,
}

impl ApiRequest {
    pub(crate) const fn new(method: Method, url: Url, headers: HeaderMap) -> Self {
        Self {
            method,
            url,
            headers,
            body: None,
            cancellation: None,
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Fully resolved request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Headers that will be sent.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.url.query_pairs_mut().append_pair(key, value.as_ref());
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialised.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let encoded = serde_json::to_vec(body).map_err(|source| ApiError::Encode { source })?;
        self.body = Some(encoded);
        Ok(self)
    }

    /// Encoded body, if one was attached.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Cancellation token stamped on the request.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Stamp a cancellation token, replacing any previous one.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = Some(token);
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Method,
        Url,
        HeaderMap,
        Option<Vec<u8>>,
        Option<CancellationToken>,
    ) {
        (
            self.method,
            self.url,
            self.headers,
            self.body,
            self.cancellation,
        )
    }
}

/// Response with its body fully buffered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Assemble a response from parts.
    #[must_use]
    pub const fn from_parts(status: StatusCode, headers: HeaderMap, url: Url, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            url,
            body,
        }
    }

    pub(crate) async fn read(response: reqwest::Response) -> ApiResult<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(ApiError::transport)?;
        Ok(Self::from_parts(status, headers, url, body.to_vec()))
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is in `200..=299`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL after redirects.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let payload: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(payload).map_err(|source| ApiError::Decode {
            status: self.status,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn url() -> Url {
        Url::parse("http://x/api/series").expect("static url")
    }

    #[test]
    fn query_parameters_are_encoded() {
        let request = ApiRequest::new(Method::GET, url(), HeaderMap::new())
            .query("seriesid[]", "1")
            .query("title", "a b&c");
        assert_eq!(
            request.url().as_str(),
            "http://x/api/series?seriesid%5B%5D=1&title=a+b%26c"
        );
    }

    #[test]
    fn json_body_is_encoded_once() -> ApiResult<()> {
        let request = ApiRequest::new(Method::POST, url(), HeaderMap::new())
            .json(&serde_json::json!({"profileid": 2}))?;
        assert_eq!(request.body(), Some(br#"{"profileid":2}"#.as_slice()));
        assert!(request.cancellation().is_none());
        Ok(())
    }

    #[test]
    fn empty_body_decodes_as_unit_and_none() -> ApiResult<()> {
        let response = ApiResponse::from_parts(StatusCode::NO_CONTENT, HeaderMap::new(), url(), Vec::new());
        response.json::<()>()?;
        assert_eq!(response.json::<Option<u32>>()?, None);
        Ok(())
    }

    #[test]
    fn decode_failure_reports_status() {
        #[derive(Debug, Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            total: u32,
        }
        let response =
            ApiResponse::from_parts(StatusCode::OK, HeaderMap::new(), url(), b"<html>".to_vec());
        let err = response.json::<Expected>().expect_err("html is not json");
        assert!(matches!(err, ApiError::Decode { status, .. } if status == StatusCode::OK));
        assert_eq!(response.text(), "<html>");
    }
}
