//! The logger sink used by the client and the logging middleware.
//!
//! The client never reaches for a process-wide logger; it is handed an
//! `Arc<dyn Logger>` at construction time and defaults to [`NoopLogger`]. Use
//! [`TracingLogger`] to forward events to `tracing`.

use std::fmt::{self, Write as _};
use tracing::Level;

/// A key-value pair attached to a log message.
pub type Field<'a> = (&'a str, &'a dyn fmt::Display);

/// A sink for leveled messages with key-value context.
pub trait Logger: Send + Sync {
    /// Records one message.
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _message: &str, _fields: &[Field<'_>]) {}
}

/// Forwards messages to the `tracing` ecosystem.
///
/// Fields are rendered into a single `fields` value as `key=value` pairs.
///
/// # Examples
///
/// ```
/// use rampart::logging::{Logger, TracingLogger};
/// use tracing::Level;
///
/// TracingLogger.log(Level::INFO, "cache warmed", &[("entries", &42)]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field<'_>]) {
        let fields = render_fields(fields);
        match level {
            Level::ERROR => tracing::error!(fields = %fields, "{}", message),
            Level::WARN => tracing::warn!(fields = %fields, "{}", message),
            Level::INFO => tracing::info!(fields = %fields, "{}", message),
            Level::DEBUG => tracing::debug!(fields = %fields, "{}", message),
            _ => tracing::trace!(fields = %fields, "{}", message),
        }
    }
}

fn render_fields(fields: &[Field<'_>]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}={}", key, value);
    }
    out
}
