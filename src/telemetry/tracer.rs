/*!
 * Structured Tracing
 * Subscriber setup and the spans the monitor runs under
 *
 * Log output goes to stderr; stdout carries mount reports only.
 */

use std::time::Instant;
use tracing::{debug, info, info_span, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Reloads slower than this are logged at warn
const SLOW_RELOAD_MS: u128 = 50;

/// Initialize the global subscriber
///
/// `RUST_LOG` selects the level (default: info). A subscriber that is
/// already installed is left in place.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        debug!(json, "tracing initialized");
    }
}

/// Unique id correlating every log line of one monitor session
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Root span for a monitor session
pub fn monitor_span(backend: &str) -> Span {
    let session = generate_session_id();
    info_span!("monitor", session = %session, backend = backend)
}

/// Times one mount table reload
pub struct ReloadSpan {
    span: Span,
    start: Instant,
}

impl ReloadSpan {
    pub fn new(backend: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "reload",
            backend = backend,
            records = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_records(&self, count: usize) {
        self.span.record("records", count);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for ReloadSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration.as_millis() > SLOW_RELOAD_MS {
            warn!(
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow mount table reload"
            );
        } else {
            debug!(duration_us = duration.as_micros() as u64, "mount table reloaded");
        }
    }
}

/// Log the startup banner fields in one structured line
pub fn log_startup(platform: &str, backend: &str, table: &str) {
    info!(platform, backend, table, "mount monitor starting");
}
