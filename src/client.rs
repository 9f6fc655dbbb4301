//! HTTP client with retries, backoff and an optional circuit breaker.
//!
//! The [`Client`] type is the main entry point for making resilient requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    config::ClientConfig,
    logging::{Logger, NoopLogger},
    middleware::{HeaderInjection, Middleware, TransportChain},
    request::Request,
    retry::RetryPolicy,
    transport::{RawResponse, ReqwestTransport, Transport},
    Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use url::Url;

/// An HTTP client that retries transient failures and can stop calling a failing
/// dependency altogether.
///
/// The client is designed to be shared: cloning is cheap and every clone uses the
/// same transport chain and the same circuit breaker.
///
/// # Examples
///
/// ```no_run
/// use rampart::{Client, Request};
/// use rampart::circuit_breaker::CircuitBreakerConfig;
/// use http::Method;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), rampart::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(5))
///     .max_retries(3)
///     .retry_wait(Duration::from_millis(100), Duration::from_secs(2))
///     .circuit_breaker(CircuitBreakerConfig::new().with_name("orders"))
///     .build()?;
///
/// let response = client.get("/orders/17").await?;
/// println!("{} after {} attempts", response.status, response.attempts);
///
/// let request = Request::new(Method::POST, "/orders")
///     .with_json(&serde_json::json!({ "sku": "A-1", "quantity": 2 }))?;
/// let created = client.send(request).await?;
/// println!("Created: {}", created.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    circuit_breaker: Option<CircuitBreaker>,
    logger: Arc<dyn Logger>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry_policy", &self.inner.retry_policy)
            .field("circuit_breaker", &self.inner.circuit_breaker)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The base URL every request path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The retry policy applied to every call.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry_policy
    }

    /// The circuit breaker shared by every call, if one is configured.
    pub fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        self.inner.circuit_breaker.as_ref()
    }

    /// Sends a request, retrying transient failures.
    ///
    /// With a circuit breaker configured, the whole call is one unit of work. Only
    /// errors for which [`Error::is_upstream_failure`] holds are recorded as breaker
    /// failures, so a terminal 4xx never opens the circuit.
    ///
    /// # Errors
    ///
    /// * [`Error::CircuitOpen`] if the breaker rejected the call; nothing was sent.
    /// * [`Error::MaxRetriesExceeded`] if every attempt failed transiently.
    /// * [`Error::HttpError`] for a terminal non-2xx/3xx status such as 404.
    /// * [`Error::Transport`] for a terminal transport fault.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_cancel(request, &CancellationToken::new()).await
    }

    /// Sends a request, giving up with [`Error::Cancelled`] as soon as `cancel` fires.
    ///
    /// Cancellation aborts an in-flight exchange as well as a pending backoff wait.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rampart::{Client, Request};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example(client: Client) -> Result<(), rampart::Error> {
    /// let shutdown = CancellationToken::new();
    /// let response = client
    ///     .send_with_cancel(Request::default(), &shutdown)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_with_cancel(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let start = Instant::now();

        let result = match &self.inner.circuit_breaker {
            Some(breaker) => {
                breaker
                    .call_with(
                        || self.run_attempts(&request, cancel, start),
                        is_breaker_success,
                    )
                    .await
            }
            None => self.run_attempts(&request, cancel, start).await,
        };

        if let Err(Error::CircuitOpen(e)) = &result {
            self.inner.logger.log(
                Level::WARN,
                "Circuit breaker rejected request",
                &[
                    ("method", &request.method),
                    ("path", &request.path),
                    ("reason", e),
                ],
            );
        }
        result
    }

    /// Sends a request with a wall-clock budget covering every attempt and wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `deadline` elapses first.
    pub async fn send_with_deadline(
        &self,
        request: Request,
        deadline: Duration,
    ) -> Result<Response> {
        let method = request.method.clone();
        let path = request.path.clone();
        match tokio::time::timeout(deadline, self.send(request)).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.logger.log(
                    Level::INFO,
                    "Request deadline elapsed",
                    &[
                        ("method", &method),
                        ("path", &path),
                        ("deadline_ms", &deadline.as_millis()),
                    ],
                );
                Err(Error::Cancelled)
            }
        }
    }

    /// The attempt loop. Runs as a single unit of work inside the circuit breaker.
    async fn run_attempts(
        &self,
        request: &Request,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<Response> {
        let policy = &self.inner.retry_policy;
        let logger = &self.inner.logger;
        let mut attempt = 0;

        loop {
            let attempt_request = request.to_attempt(&self.inner.base_url)?;
            logger.log(
                Level::DEBUG,
                "Executing HTTP request",
                &[
                    ("method", &attempt_request.method),
                    ("url", &attempt_request.url),
                    ("attempt", &(attempt + 1)),
                ],
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(request, attempt + 1)),
                result = self.inner.transport.send(attempt_request) => result,
            };

            if !policy.should_retry(result.as_ref().ok(), result.as_ref().err()) {
                return self.finish(result, start.elapsed(), attempt + 1);
            }

            let failure = match result {
                Ok(raw) => http_error(raw),
                Err(e) => e,
            };
            logger.log(
                Level::WARN,
                "Request failed",
                &[
                    ("method", &request.method),
                    ("path", &request.path),
                    ("attempt", &(attempt + 1)),
                    ("error", &failure),
                ],
            );

            if attempt >= policy.max_retries {
                let elapsed = start.elapsed();
                logger.log(
                    Level::ERROR,
                    "Max retries exceeded",
                    &[
                        ("method", &request.method),
                        ("path", &request.path),
                        ("attempts", &(attempt + 1)),
                        ("elapsed_ms", &elapsed.as_millis()),
                    ],
                );
                return Err(Error::MaxRetriesExceeded {
                    attempts: attempt + 1,
                    elapsed,
                    last_error: Box::new(failure),
                });
            }

            let delay = policy.backoff(attempt);
            logger.log(
                Level::INFO,
                "Retrying request after delay",
                &[
                    ("delay_ms", &delay.as_millis()),
                    ("attempt", &(attempt + 1)),
                ],
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(request, attempt + 1)),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// Converts the terminal outcome of an attempt into the caller-facing result.
    fn finish(
        &self,
        result: Result<RawResponse>,
        latency: Duration,
        attempts: usize,
    ) -> Result<Response> {
        let raw = result?;
        let status = raw.status;

        self.inner.logger.log(
            Level::INFO,
            "Received HTTP response",
            &[
                ("status", &status.as_u16()),
                ("latency_ms", &latency.as_millis()),
                ("attempts", &attempts),
            ],
        );

        if status.is_success() || status.is_redirection() {
            return Ok(Response::new(
                status,
                raw.headers,
                raw.body,
                latency,
                attempts,
            ));
        }

        let err = http_error(raw);
        let level = if status.is_client_error() {
            Level::ERROR
        } else {
            Level::WARN
        };
        self.inner
            .logger
            .log(level, "Terminal HTTP error", &[("error", &err)]);
        Err(err)
    }

    fn cancelled(&self, request: &Request, attempts: usize) -> Error {
        self.inner.logger.log(
            Level::INFO,
            "Request cancelled",
            &[
                ("method", &request.method),
                ("path", &request.path),
                ("attempts", &attempts),
            ],
        );
        Error::Cancelled
    }

    /// Sends a GET request to the specified path.
    pub async fn get(&self, path: impl Into<String>) -> Result<Response> {
        self.send(Request::new(Method::GET, path)).await
    }

    /// Sends a DELETE request to the specified path.
    pub async fn delete(&self, path: impl Into<String>) -> Result<Response> {
        self.send(Request::new(Method::DELETE, path)).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post_json<T>(&self, path: impl Into<String>, body: &T) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        self.send(Request::new(Method::POST, path).with_json(body)?)
            .await
    }

    /// Sends a PUT request with a JSON body.
    pub async fn put_json<T>(&self, path: impl Into<String>, body: &T) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        self.send(Request::new(Method::PUT, path).with_json(body)?)
            .await
    }
}

fn is_breaker_success(result: &Result<Response>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => !e.is_upstream_failure(),
    }
}

fn http_error(raw: RawResponse) -> Error {
    Error::HttpError {
        status: raw.status,
        raw_response: String::from_utf8_lossy(&raw.body).into_owned(),
        headers: raw.headers,
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Every parameter is checked in [`build`](Self::build); a client that builds is
/// fully usable.
///
/// # Examples
///
/// ```no_run
/// use rampart::ClientBuilder;
/// use rampart::logging::TracingLogger;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), rampart::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com/v1")
///     .timeout(Duration::from_secs(10))
///     .max_retries(4)
///     .default_header("User-Agent", "billing/2.1")?
///     .logger(Arc::new(TracingLogger))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    circuit_breaker: Option<CircuitBreakerConfig>,
    transport: Option<Arc<dyn Transport>>,
    middleware: Vec<Arc<dyn Middleware>>,
    default_headers: HeaderMap,
    logger: Arc<dyn Logger>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    ///
    /// Defaults: no timeout, [`RetryPolicy::default`], no circuit breaker, the
    /// `reqwest` transport and a [`NoopLogger`].
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: None,
            retry_policy: RetryPolicy::default(),
            circuit_breaker: None,
            transport: None,
            middleware: Vec::new(),
            default_headers: HeaderMap::new(),
            logger: Arc::new(NoopLogger),
        }
    }

    /// Creates a builder from declarative settings.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::new()
            .base_url(config.base_url.clone())
            .max_retries(config.max_retries)
            .retry_wait(config.retry_wait_min(), config.retry_wait_max());
        if config.timeout_ms > 0 {
            builder = builder.timeout(config.timeout());
        }
        if let Some(breaker) = &config.circuit_breaker {
            builder = builder.circuit_breaker(breaker.to_config());
        }
        builder
    }

    /// Sets the base URL for all requests. Required.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-attempt timeout of the default transport. Zero disables it.
    ///
    /// Has no effect when a custom transport is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how many times a failed attempt is retried.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.retry_policy.max_retries = max_retries;
        self
    }

    /// Sets the bounds of the wait between attempts.
    pub fn retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.retry_policy.wait_min = min;
        self.retry_policy.wait_max = max;
        self
    }

    /// Replaces the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Enables a circuit breaker around every call.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    /// Replaces the default `reqwest` base transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Appends a middleware to the transport chain.
    ///
    /// The first middleware added is the outermost.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// Headers set on a [`Request`] take precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the logger sink. Defaults to [`NoopLogger`].
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is missing, empty or invalid,
    /// if the retry wait bounds are inverted, or if the default transport cannot be
    /// created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;
        let base_url = parse_base_url(base_url)?;

        self.retry_policy.validate()?;

        let base = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        let mut chain = TransportChain::from_arc(base);
        if !self.default_headers.is_empty() {
            chain.push(Arc::new(HeaderInjection::from_headers(self.default_headers)));
        }
        for middleware in self.middleware {
            chain.push(middleware);
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url,
                transport: chain.build(),
                retry_policy: self.retry_policy,
                circuit_breaker: self.circuit_breaker.map(CircuitBreaker::new),
                logger: self.logger,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the base URL and makes sure relative paths resolve beneath it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| Error::ConfigurationError(format!("Invalid base URL {:?}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::ConfigurationError(format!(
            "Base URL {:?} cannot be used as a base",
            raw
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
