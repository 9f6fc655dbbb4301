//! Composable transport decorators.
//!
//! A [`Middleware`] wraps a lower-level [`Transport`] and returns a higher-level
//! one. [`TransportChain`] composes them over a base transport: the first
//! middleware registered is the outermost, so requests pass through decorators in
//! registration order and responses come back in reverse.
//!
//! Decorators must not assume anything about their neighbours and must hand back
//! responses and errors from the inner transport unchanged in shape.
//!
//! # Examples
//!
//! ```no_run
//! use rampart::middleware::{HeaderInjection, Logging, TransportChain};
//! use rampart::logging::TracingLogger;
//! use rampart::transport::ReqwestTransport;
//! use std::sync::Arc;
//!
//! # fn example() -> rampart::Result<()> {
//! let transport = TransportChain::new(ReqwestTransport::new(None)?)
//!     .with(HeaderInjection::new().header("user-agent", "billing/2.1")?)
//!     .with(Logging::new(Arc::new(TracingLogger)))
//!     .build();
//! # Ok(())
//! # }
//! ```

use crate::logging::Logger;
use crate::transport::{RawResponse, Transport, TransportRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

/// Wraps a transport to produce a decorated one.
///
/// Any `Fn(Arc<dyn Transport>) -> Arc<dyn Transport>` closure is a middleware.
pub trait Middleware: Send + Sync {
    /// Returns a transport that decorates `next`.
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport>;
}

impl<F> Middleware for F
where
    F: Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync,
{
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        self(next)
    }
}

/// An ordered list of middleware over a base transport.
#[derive(Clone)]
pub struct TransportChain {
    base: Arc<dyn Transport>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for TransportChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportChain")
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

impl TransportChain {
    /// Starts a chain over `base` with no middleware.
    pub fn new(base: impl Transport + 'static) -> Self {
        Self::from_arc(Arc::new(base))
    }

    /// Starts a chain over a shared base transport.
    pub fn from_arc(base: Arc<dyn Transport>) -> Self {
        Self {
            base,
            middleware: Vec::new(),
        }
    }

    /// Appends a middleware; it sits inside every middleware added before it.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub(crate) fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// The number of middleware in the chain, base transport excluded.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns `true` if the chain has no middleware.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Composes the chain into a single transport.
    pub fn build(&self) -> Arc<dyn Transport> {
        self.middleware
            .iter()
            .rev()
            .fold(self.base.clone(), |next, middleware| middleware.wrap(next))
    }
}

/// Adds headers to every request that does not already carry them.
#[derive(Debug, Clone, Default)]
pub struct HeaderInjection {
    headers: HeaderMap,
}

impl HeaderInjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects the given headers.
    pub fn from_headers(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Adds a header to inject.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }
}

impl Middleware for HeaderInjection {
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(HeaderInjectionTransport {
            headers: self.headers.clone(),
            next,
        })
    }
}

struct HeaderInjectionTransport {
    headers: HeaderMap,
    next: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for HeaderInjectionTransport {
    async fn send(&self, mut request: TransportRequest) -> Result<RawResponse> {
        for name in self.headers.keys() {
            if request.headers.contains_key(name) {
                continue;
            }
            for value in self.headers.get_all(name) {
                request.headers.append(name.clone(), value.clone());
            }
        }
        self.next.send(request).await
    }
}

/// Logs every exchange with its outcome and elapsed time.
#[derive(Clone)]
pub struct Logging {
    logger: Arc<dyn Logger>,
}

impl Logging {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl Middleware for Logging {
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(LoggingTransport {
            logger: self.logger.clone(),
            next,
        })
    }
}

struct LoggingTransport {
    logger: Arc<dyn Logger>,
    next: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        let method = request.method.clone();
        let url = request.url.clone();
        let start = Instant::now();

        let result = self.next.send(request).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => self.logger.log(
                Level::DEBUG,
                "HTTP exchange completed",
                &[
                    ("method", &method),
                    ("url", &url),
                    ("status", &response.status.as_u16()),
                    ("elapsed_ms", &elapsed_ms),
                ],
            ),
            Err(e) => self.logger.log(
                Level::WARN,
                "HTTP exchange failed",
                &[
                    ("method", &method),
                    ("url", &url),
                    ("error", e),
                    ("elapsed_ms", &elapsed_ms),
                ],
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Field;
    use crate::TransportErrorKind;
    use http::{Method, StatusCode};
    use std::sync::Mutex;
    use url::Url;

    type Trace = Arc<Mutex<Vec<String>>>;

    /// Echoes request headers back as response headers.
    struct Echo {
        trace: Trace,
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
            self.trace.lock().unwrap().push("base".to_string());
            Ok(RawResponse {
                status: StatusCode::OK,
                headers: request.headers,
                body: "ok".into(),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        async fn send(&self, _request: TransportRequest) -> Result<RawResponse> {
            Err(Error::transport(TransportErrorKind::ConnectionReset, "reset by peer"))
        }
    }

    struct Tag {
        name: &'static str,
        trace: Trace,
        next: Arc<dyn Transport>,
    }

    #[async_trait]
    impl Transport for Tag {
        async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
            self.trace.lock().unwrap().push(format!("{} >", self.name));
            let result = self.next.send(request).await;
            self.trace.lock().unwrap().push(format!("{} <", self.name));
            result
        }
    }

    fn tag(name: &'static str, trace: &Trace) -> impl Middleware {
        let trace = trace.clone();
        move |next: Arc<dyn Transport>| -> Arc<dyn Transport> {
            Arc::new(Tag {
                name,
                trace: trace.clone(),
                next,
            })
        }
    }

    fn request() -> TransportRequest {
        TransportRequest {
            method: Method::GET,
            url: Url::parse("http://localhost/items").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<(Level, String, String)>>,
    }

    impl Logger for Recorder {
        fn log(&self, level: Level, message: &str, fields: &[Field<'_>]) {
            let rendered = fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            self.lines
                .lock()
                .unwrap()
                .push((level, message.to_string(), rendered));
        }
    }

    #[tokio::test]
    async fn test_first_registered_is_outermost() {
        let trace = Trace::default();
        let transport = TransportChain::new(Echo {
            trace: trace.clone(),
        })
        .with(tag("outer", &trace))
        .with(tag("inner", &trace))
        .build();

        transport.send(request()).await.unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer >", "inner >", "base", "inner <", "outer <"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_the_base_transport() {
        let trace = Trace::default();
        let chain = TransportChain::new(Echo {
            trace: trace.clone(),
        });
        assert!(chain.is_empty());

        let response = chain.build().send(request()).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(*trace.lock().unwrap(), vec!["base"]);
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let trace = Trace::default();
        let transport = TransportChain::new(Failing)
            .with(tag("outer", &trace))
            .with(HeaderInjection::new().header("x-team", "billing").unwrap())
            .build();

        let err = transport.send(request()).await.unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionReset));
        assert_eq!(*trace.lock().unwrap(), vec!["outer >", "outer <"]);
    }

    #[tokio::test]
    async fn test_header_injection_keeps_request_headers() {
        let transport = TransportChain::new(Echo {
            trace: Trace::default(),
        })
        .with(
            HeaderInjection::new()
                .header("user-agent", "rampart-test")
                .unwrap()
                .header("x-tenant", "default")
                .unwrap(),
        )
        .build();

        let mut req = request();
        req.headers
            .insert("x-tenant", HeaderValue::from_static("acme"));
        let response = transport.send(req).await.unwrap();

        assert_eq!(response.headers["user-agent"], "rampart-test");
        assert_eq!(response.headers["x-tenant"], "acme");
        assert_eq!(response.headers.get_all("x-tenant").iter().count(), 1);
    }

    #[test]
    fn test_header_injection_rejects_invalid_names() {
        assert!(matches!(
            HeaderInjection::new().header("bad header", "v"),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_logging_records_success_and_failure() {
        let recorder = Arc::new(Recorder::default());
        let logging = Logging::new(recorder.clone());

        let ok = TransportChain::new(Echo {
            trace: Trace::default(),
        })
        .with(logging.clone())
        .build();
        ok.send(request()).await.unwrap();

        let failing = TransportChain::new(Failing).with(logging).build();
        failing.send(request()).await.unwrap_err();

        let lines = recorder.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, Level::DEBUG);
        assert!(lines[0].2.contains("status=200"));
        assert!(lines[0].2.contains("url=http://localhost/items"));
        assert_eq!(lines[1].0, Level::WARN);
        assert!(lines[1].2.contains("reset by peer"));
    }
}
