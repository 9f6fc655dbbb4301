//! Successful response with call metadata.
//!
//! The [`Response`] type keeps the raw body together with the latency of the whole
//! logical call and the number of attempts it took, which makes retry behaviour
//! visible to callers and in logs.

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A successful (2xx or 3xx) HTTP response.
///
/// # Examples
///
/// ```no_run
/// use rampart::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Order {
///     id: u64,
/// }
///
/// # async fn example() -> Result<(), rampart::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let response = client.get("/orders/17").await?;
/// println!("Took {:?} over {} attempts", response.latency, response.attempts);
///
/// let order: Order = response.json()?;
/// println!("Order {}", order.id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub body: Bytes,

    /// The total latency of the call, including every retry and backoff wait.
    pub latency: Duration,

    /// The number of attempts made to complete this call.
    ///
    /// This will be `1` for calls that succeeded on the first try.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            latency,
            attempts,
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] with the raw body preserved if the
    /// body does not match `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rampart::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     "[1, 2, 3]".into(),
    ///     Duration::from_millis(12),
    ///     1,
    /// );
    ///
    /// let ids: Vec<u32> = response.json().unwrap();
    /// assert_eq!(ids, vec![1, 2, 3]);
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::error!(
                error = %e,
                status = self.status.as_u16(),
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: self.text(),
                serde_error: e.to_string(),
                status: self.status,
            }
        })
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(body: &'static str, attempts: usize) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Response::new(
            StatusCode::OK,
            headers,
            Bytes::from_static(body.as_bytes()),
            Duration::from_millis(5),
            attempts,
        )
    }

    #[test]
    fn test_json_failure_preserves_body() {
        let err = response("not json", 1).json::<serde_json::Value>().unwrap_err();
        match err {
            Error::DeserializationFailed {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, "not json");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_accessors() {
        let r = response("{}", 3);
        assert!(r.was_retried());
        assert_eq!(r.header("content-type"), Some("application/json"));
        assert_eq!(r.header("x-missing"), None);
        assert_eq!(r.text(), "{}");
        assert!(!response("{}", 1).was_retried());
    }
}
