//! Error types for resilient HTTP calls.
//!
//! Every failure a caller can observe is a variant of [`Error`]. The variants are
//! shaped so callers can tell apart the three situations that need different
//! reactions:
//!
//! * [`Error::CircuitOpen`] - the dependency is known to be failing and no request
//!   was sent; apply a fallback.
//! * [`Error::MaxRetriesExceeded`] - every permitted attempt failed with a transient
//!   fault; the last fault is preserved in `last_error`.
//! * [`Error::HttpError`] with a 4xx status - a terminal, caller-side problem.

use crate::circuit_breaker::CircuitOpenError;
use crate::retry::is_retryable_status;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::time::Duration;

/// The class of a transport-level fault.
///
/// Base transports map their native errors onto these kinds so the retry policy
/// can classify them without knowing which HTTP stack produced them. Only timeouts,
/// refused or reset connections, broken pipes, truncated streams and name
/// resolution failures are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection or the exchange timed out.
    Timeout,
    /// The peer refused the connection.
    ConnectionRefused,
    /// The peer reset the connection.
    ConnectionReset,
    /// The connection was aborted locally or the socket is not connected. Terminal.
    ConnectionAborted,
    /// Writing to a connection the peer already closed.
    BrokenPipe,
    /// The stream ended before a complete response was read.
    UnexpectedEof,
    /// The host name could not be resolved.
    NameResolution,
    /// Establishing the connection failed for another reason, such as a TLS
    /// handshake or certificate error. Terminal.
    Connect,
    /// The request could not be built or sent as given.
    InvalidRequest,
    /// Any other transport fault.
    Other,
}

impl TransportErrorKind {
    /// Returns `true` for faults that are likely transient.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::ConnectionRefused
                | TransportErrorKind::ConnectionReset
                | TransportErrorKind::BrokenPipe
                | TransportErrorKind::UnexpectedEof
                | TransportErrorKind::NameResolution
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::ConnectionReset => "connection reset",
            TransportErrorKind::ConnectionAborted => "connection aborted",
            TransportErrorKind::BrokenPipe => "broken pipe",
            TransportErrorKind::UnexpectedEof => "unexpected end of stream",
            TransportErrorKind::NameResolution => "name resolution failed",
            TransportErrorKind::Connect => "connect failed",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Other => "transport failure",
        };
        f.write_str(s)
    }
}

/// The main error type for resilient HTTP calls.
///
/// # Examples
///
/// ```no_run
/// use rampart::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// match client.get("/inventory").await {
///     Ok(response) => println!("Success: {}", response.text()),
///     Err(Error::CircuitOpen(e)) => eprintln!("Serving cached data: {}", e),
///     Err(Error::MaxRetriesExceeded { attempts, last_error, .. }) => {
///         eprintln!("Gave up after {} attempts: {}", attempts, last_error);
///     }
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A transport-level fault (connection, DNS, timeout, truncated stream...).
    ///
    /// `kind` drives retry classification; `source` keeps the native error of the
    /// base transport for inspection.
    #[error("Transport error ({kind}): {message}")]
    Transport {
        /// The fault class
        kind: TransportErrorKind,
        /// Human readable description
        message: String,
        /// The error reported by the base transport, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server returned a status that is not 2xx or 3xx.
    ///
    /// The status, body and headers are preserved for inspection.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// Failed to deserialize a response body into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided at construction time.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every permitted attempt failed with a retryable fault.
    ///
    /// `last_error` is the failure observed on the final attempt.
    #[error("Max retries exceeded after {attempts} attempts in {elapsed:?}: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made
        attempts: usize,
        /// Time spent from the first attempt until giving up
        elapsed: Duration,
        /// The last error encountered
        #[source]
        last_error: Box<Error>,
    },

    /// The circuit breaker rejected the call; no request was sent.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The caller's cancellation signal fired before the call completed.
    #[error("Request cancelled")]
    Cancelled,

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Creates a transport error without an underlying source.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Error::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` if this error is worth another attempt.
    ///
    /// Transient transport faults and 429/500/502/503/504 responses are retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use rampart::{Error, TransportErrorKind};
    /// use http::StatusCode;
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     raw_response: "down for maintenance".to_string(),
    ///     headers: http::HeaderMap::new(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::transport(TransportErrorKind::ConnectionRefused, "refused");
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::transport(TransportErrorKind::InvalidRequest, "bad header");
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { kind, .. } => kind.is_retryable(),
            Error::HttpError { status, .. } => is_retryable_status(*status),
            Error::DeserializationFailed { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::MaxRetriesExceeded { .. } => false,
            Error::CircuitOpen(_) => false,
            Error::Cancelled => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns `true` if this error says the upstream itself is unhealthy.
    ///
    /// Only these errors count as circuit breaker failures. A terminal
    /// [`Error::HttpError`] is an answer from a working upstream, usually to a
    /// caller-side defect, and request construction errors never reached the
    /// network.
    pub fn is_upstream_failure(&self) -> bool {
        match self {
            Error::Transport { kind, .. } => *kind != TransportErrorKind::InvalidRequest,
            Error::MaxRetriesExceeded { .. } => true,
            Error::Cancelled => true,
            Error::HttpError { .. } => false,
            Error::DeserializationFailed { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::CircuitOpen(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the transport fault class, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    ///
    /// Looks through `MaxRetriesExceeded` at the last observed failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self.root_cause() {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self.root_cause() {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns `true` if the circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen(_))
    }

    /// Returns `true` if the call was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the innermost failure, unwrapping `MaxRetriesExceeded`.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::MaxRetriesExceeded { last_error, .. } = current {
            current = last_error;
        }
        current
    }
}

/// A specialized `Result` type for resilient HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
