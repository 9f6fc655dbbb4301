//! # Rampart - a resilient outbound HTTP client
//!
//! Rampart issues requests to an unreliable upstream while protecting both the
//! caller and the upstream from cascading failure. Every logical call goes through
//! the same pipeline:
//!
//! ```text
//! breaker admission -> attempt loop -> transport chain -> base transport
//!                           ^                                  |
//!                           +-- backoff <- retry classification +
//! ```
//!
//! * The [circuit breaker](circuit_breaker) gates the whole call. A call that exhausts
//!   its retries counts as a single failure.
//! * The [retry policy](RetryPolicy) retries transient transport faults and
//!   429/500/502/503/504 responses, waiting a jittered exponential
//!   [backoff](backoff::exponential) between attempts.
//! * The [transport chain](middleware::TransportChain) decorates the base
//!   [`Transport`](transport::Transport) with middleware such as header injection and
//!   logging.
//! * Cancellation is observed during every exchange and every backoff wait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rampart::{Client, Error};
//! use rampart::circuit_breaker::CircuitBreakerConfig;
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Quote {
//!     symbol: String,
//!     price: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let client = Client::builder()
//!         .base_url("https://quotes.example.com")
//!         .timeout(Duration::from_secs(2))
//!         .max_retries(3)
//!         .retry_wait(Duration::from_millis(50), Duration::from_secs(1))
//!         .circuit_breaker(CircuitBreakerConfig::new().with_name("quotes"))
//!         .build()?;
//!
//!     match client.get("/quotes/ACME").await {
//!         Ok(response) => {
//!             let quote: Quote = response.json()?;
//!             println!("{} = {}", quote.symbol, quote.price);
//!         }
//!         Err(e) if e.is_circuit_open() => println!("quotes unavailable, using cache"),
//!         Err(Error::MaxRetriesExceeded { attempts, last_error, .. }) => {
//!             println!("upstream failing after {} attempts: {}", attempts, last_error);
//!         }
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod circuit_breaker;
mod client;
pub mod config;
mod error;
pub mod logging;
pub mod middleware;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result, TransportErrorKind};
pub use request::Request;
pub use response::Response;
pub use retry::RetryPolicy;
