//! The base transport abstraction and its default `reqwest` implementation.
//!
//! A [`Transport`] performs one literal network exchange. It knows nothing about
//! retries or circuit breaking; the [`Client`](crate::Client) drives those around
//! it. Decorators are layered over a base transport with
//! [`TransportChain`](crate::middleware::TransportChain).

use crate::{Error, Result, TransportErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use url::Url;

/// One attempt of a logical call: a fully resolved request.
///
/// The client builds a fresh `TransportRequest` for every attempt, so a transport
/// may consume it freely.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute target URL, query parameters included.
    pub url: Url,
    /// Headers to send.
    pub headers: HeaderMap,
    /// The request body, if any.
    pub body: Option<Bytes>,
}

/// The status, headers and body returned by a transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The fully read response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Performs the network exchange for a single attempt.
///
/// Implementations must be cancel-safe: the client drops the returned future when
/// the caller cancels, and that must abort the exchange.
///
/// # Examples
///
/// ```
/// use rampart::transport::{RawResponse, Transport, TransportRequest};
/// use http::StatusCode;
///
/// struct AlwaysOk;
///
/// #[async_trait::async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(&self, _request: TransportRequest) -> rampart::Result<RawResponse> {
///         Ok(RawResponse::new(StatusCode::OK, "ok"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and reads the complete response.
    ///
    /// Any status code is a successful exchange; `Err` is reserved for faults
    /// where no complete response was received.
    async fn send(&self, request: TransportRequest) -> Result<RawResponse>;
}

/// The default base transport, backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose exchanges time out after `timeout`.
    ///
    /// `None` or a zero duration disables the per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the underlying client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Maps an I/O error onto a transport fault class.
pub fn classify_io_error(err: &io::Error) -> TransportErrorKind {
    match err.kind() {
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset => TransportErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted | io::ErrorKind::NotConnected => {
            TransportErrorKind::ConnectionAborted
        }
        io::ErrorKind::BrokenPipe => TransportErrorKind::BrokenPipe,
        io::ErrorKind::UnexpectedEof => TransportErrorKind::UnexpectedEof,
        io::ErrorKind::InvalidInput => TransportErrorKind::InvalidRequest,
        _ => TransportErrorKind::Other,
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport {
            kind: classify_io_error(&err),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    Error::Transport {
        kind: classify_reqwest_error(&err),
        message: err.to_string(),
        source: Some(Box::new(err)),
    }
}

/// Classifies a `reqwest` error by its flags and its source chain.
///
/// `reqwest` does not expose the underlying cause directly, so the chain is walked
/// looking for an `io::Error` or for the messages hyper uses for DNS failures and
/// truncated responses.
fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_builder() {
        return TransportErrorKind::InvalidRequest;
    }
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if let Some(kind) = classify_source_chain(err) {
        return kind;
    }
    if err.is_connect() {
        return TransportErrorKind::Connect;
    }
    TransportErrorKind::Other
}

fn classify_source_chain(err: &(dyn StdError + 'static)) -> Option<TransportErrorKind> {
    let mut current = err.source();
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            let kind = classify_io_error(io_err);
            if kind != TransportErrorKind::Other {
                return Some(kind);
            }
        }

        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return Some(TransportErrorKind::NameResolution);
        }
        if text.contains("connection closed before message completed")
            || text.contains("unexpected eof")
            || text.contains("unexpected end of file")
        {
            return Some(TransportErrorKind::UnexpectedEof);
        }

        current = cause.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapper {
        message: &'static str,
        inner: Option<Box<dyn StdError + Send + Sync>>,
    }

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.inner.as_deref().map(|e| e as &(dyn StdError + 'static))
        }
    }

    fn wrap(inner: impl StdError + Send + Sync + 'static) -> Wrapper {
        Wrapper {
            message: "error sending request",
            inner: Some(Box::new(inner)),
        }
    }

    #[test]
    fn test_classify_io_error_kinds() {
        let cases = [
            (io::ErrorKind::TimedOut, TransportErrorKind::Timeout),
            (io::ErrorKind::ConnectionRefused, TransportErrorKind::ConnectionRefused),
            (io::ErrorKind::ConnectionReset, TransportErrorKind::ConnectionReset),
            (io::ErrorKind::NotConnected, TransportErrorKind::ConnectionAborted),
            (io::ErrorKind::BrokenPipe, TransportErrorKind::BrokenPipe),
            (io::ErrorKind::UnexpectedEof, TransportErrorKind::UnexpectedEof),
            (io::ErrorKind::PermissionDenied, TransportErrorKind::Other),
        ];
        for (io_kind, expected) in cases {
            assert_eq!(classify_io_error(&io::Error::from(io_kind)), expected);
        }
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let err = Error::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionReset));
        assert!(err.is_retryable());
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_source_chain_finds_nested_io_error() {
        let nested = wrap(Wrapper {
            message: "client error (Connect)",
            inner: Some(Box::new(io::Error::from(io::ErrorKind::ConnectionRefused))),
        });
        assert_eq!(
            classify_source_chain(&nested),
            Some(TransportErrorKind::ConnectionRefused)
        );
    }

    #[test]
    fn test_source_chain_detects_dns_and_eof_messages() {
        let dns = wrap(Wrapper {
            message: "dns error: failed to lookup address information",
            inner: None,
        });
        assert_eq!(
            classify_source_chain(&dns),
            Some(TransportErrorKind::NameResolution)
        );

        let eof = wrap(Wrapper {
            message: "connection closed before message completed",
            inner: None,
        });
        assert_eq!(
            classify_source_chain(&eof),
            Some(TransportErrorKind::UnexpectedEof)
        );

        let plain = Wrapper {
            message: "something else",
            inner: None,
        };
        assert_eq!(classify_source_chain(&plain), None);
    }
}
