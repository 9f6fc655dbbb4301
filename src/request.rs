//! Logical request description.
//!
//! A [`Request`] describes one logical call relative to the client's base URL. The
//! client turns it into a fresh [`TransportRequest`] for every attempt, so the body
//! is never consumed by a failed attempt.

use crate::transport::TransportRequest;
use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;

/// A logical HTTP request.
///
/// # Examples
///
/// ```
/// use rampart::Request;
/// use http::Method;
///
/// let request = Request::new(Method::GET, "/orders")
///     .with_query_param("status", "open")
///     .with_header("x-request-id", "a1b2")
///     .unwrap();
/// assert_eq!(request.path, "/orders");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path (relative to the base URL).
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters, in insertion order.
    pub query_params: Vec<(String, String)>,

    /// The request body.
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a new `Request` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Sets a raw request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `body` as JSON and sets the content type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body)
            .map_err(|e| Error::ConfigurationError(format!("Failed to serialize request: {}", e)))?;
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(json));
        Ok(self)
    }

    /// Resolves the request against `base_url` into a fresh attempt.
    pub(crate) fn to_attempt(&self, base_url: &Url) -> Result<TransportRequest> {
        let mut url = base_url.join(self.path.trim_start_matches('/'))?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(TransportRequest {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
        })
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_resolves_against_base_path() {
        let base = Url::parse("https://api.example.com/v2/").unwrap();
        let request = Request::new(Method::GET, "/orders/17")
            .with_query_param("expand", "lines")
            .with_query_param("expand", "customer");

        let attempt = request.to_attempt(&base).unwrap();
        assert_eq!(
            attempt.url.as_str(),
            "https://api.example.com/v2/orders/17?expand=lines&expand=customer"
        );
    }

    #[test]
    fn test_each_attempt_gets_its_own_body() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        let request = Request::new(Method::POST, "submit").with_body("payload");

        let first = request.to_attempt(&base).unwrap();
        let second = request.to_attempt(&base).unwrap();
        drop(first);
        assert_eq!(second.body.as_deref(), Some(&b"payload"[..]));
        assert_eq!(request.body.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_with_json_sets_content_type() {
        let request = Request::new(Method::POST, "/items")
            .with_json(&serde_json::json!({"sku": "A-1"}))
            .unwrap();
        assert_eq!(request.headers[http::header::CONTENT_TYPE], "application/json");
        assert_eq!(request.body.as_deref(), Some(&br#"{"sku":"A-1"}"#[..]));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let result = Request::new(Method::GET, "/").with_header("x-bad", "line\nbreak");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
