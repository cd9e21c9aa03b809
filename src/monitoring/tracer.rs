/*!
 * Structured Tracing
 * Subscriber setup and timed spans for driver calls
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Environment variable enabling JSON formatted output
pub const ENV_TRACE_JSON: &str = "AIOS_NET_TRACE_JSON";

/// Calls slower than this are reported at warn level
const SLOW_CALL: Duration = Duration::from_millis(100);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - AIOS_NET_TRACE_JSON: Enable JSON output (default: false)
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    if let Err(e) = try_init_tracing() {
        panic!("failed to install tracing subscriber: {}", e);
    }
}

/// Like [`init_tracing`], but returns an error instead of panicking when a
/// subscriber is already set. Safe to call from every test.
pub fn try_init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()?;
    }

    info!("network tracing initialized");
    Ok(())
}

/// Timed span around one driver call
pub struct CallSpan {
    span: tracing::Span,
    start: Instant,
    driver: String,
    method: &'static str,
}

impl CallSpan {
    pub fn new(driver: &str, method: &'static str) -> Self {
        let span = span!(
            Level::DEBUG,
            "driver_call",
            driver = driver,
            method = method,
            duration_ms = tracing::field::Empty,
            result = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            driver: driver.to_string(),
            method,
        }
    }

    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_ms", duration.as_millis() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_CALL {
            warn!(
                driver = %self.driver,
                method = self.method,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow driver call"
            );
        } else {
            debug!(
                driver = %self.driver,
                method = self.method,
                duration_us = duration.as_micros() as u64,
                "driver call completed"
            );
        }
    }
}
