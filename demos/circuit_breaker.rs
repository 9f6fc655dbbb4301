//! Example demonstrating the circuit breaker.
//!
//! This example runs offline against an in-process transport that fails for a
//! while and then recovers. It shows how to:
//! - Configure a breaker and watch its state transitions
//! - Tell an open circuit apart from exhausted retries
//! - Let the breaker probe and close again once the upstream recovers
//! - See that terminal 4xx answers never open the circuit
//!
//! Run with: `cargo run --example circuit_breaker`

use async_trait::async_trait;
use http::StatusCode;
use rampart::circuit_breaker::CircuitBreakerConfig;
use rampart::transport::{RawResponse, Transport, TransportRequest};
use rampart::{Client, Error, TransportErrorKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Refuses connections until `healthy` is set; `/missing` always answers 404.
struct FlakyUpstream {
    healthy: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for FlakyUpstream {
    async fn send(&self, request: TransportRequest) -> rampart::Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.url.path() == "/missing" {
            return Ok(RawResponse::new(StatusCode::NOT_FOUND, "no such thing"));
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(RawResponse::new(StatusCode::OK, "{\"status\":\"ok\"}"))
        } else {
            Err(Error::transport(
                TransportErrorKind::ConnectionRefused,
                "connection refused",
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("rampart=info")
        .init();

    let healthy = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let client = Client::builder()
        .base_url("http://inventory.internal")
        .transport(FlakyUpstream {
            healthy: healthy.clone(),
            calls: calls.clone(),
        })
        .max_retries(1)
        .retry_wait(Duration::from_millis(10), Duration::from_millis(20))
        .circuit_breaker(
            CircuitBreakerConfig::new()
                .with_name("inventory")
                .with_timeout(Duration::from_millis(200))
                .with_ready_to_trip(|counts| counts.consecutive_failures >= 2)
                .with_on_state_change(|name, from, to| {
                    println!("  [{}] {} -> {}", name, from, to);
                }),
        )
        .build()?;

    println!("=== Example 1: Terminal 4xx answers ===");
    for _ in 0..5 {
        if let Err(e) = client.get("/missing").await {
            println!("Caller-side error: {}", e);
        }
    }
    if let Some(breaker) = client.circuit_breaker() {
        println!("Breaker after five 404s: {}", breaker.state());
    }
    println!();

    println!("=== Example 2: Failing upstream trips the breaker ===");
    for i in 1..=4 {
        match client.get("/stock/42").await {
            Ok(response) => println!("Call {}: {}", i, response.text()),
            Err(e) if e.is_circuit_open() => {
                println!("Call {}: rejected without a request ({})", i, e)
            }
            Err(Error::MaxRetriesExceeded { attempts, .. }) => {
                println!("Call {}: gave up after {} attempts", i, attempts)
            }
            Err(e) => println!("Call {}: {}", i, e),
        }
    }
    println!("Transport calls so far: {}", calls.load(Ordering::SeqCst));
    println!();

    println!("=== Example 3: Recovery through Half-Open ===");
    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;

    let response = client.get("/stock/42").await?;
    println!("Probe succeeded: {}", response.text());
    if let Some(breaker) = client.circuit_breaker() {
        let snapshot = breaker.snapshot();
        println!("Breaker is {} with counts {:?}", snapshot.state, snapshot.counts);
    }

    Ok(())
}
