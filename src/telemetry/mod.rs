/*!
 * Telemetry
 * Logging setup and tracing spans
 */

mod tracer;

pub use tracer::{generate_session_id, init_tracing, log_startup, monitor_span, ReloadSpan};
