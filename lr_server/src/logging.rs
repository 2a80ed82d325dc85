//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; the subscriber installed
//! here picks those records up alongside native `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging.
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use lr_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of one ranking calculation
///
/// # Arguments
///
/// * `competition_id` / `category_id` - Ranking key
/// * `trigger` - What started the calculation (`manual`, `scores_changed`, `auto`)
/// * `result` - `Ok(participants_processed)` or the error text
/// * `duration_ms` - Wall time of the call
pub fn log_calculation(
    competition_id: i64,
    category_id: i64,
    trigger: &str,
    result: Result<u32, &str>,
    duration_ms: u64,
) {
    match result {
        Ok(participants) => tracing::info!(
            competition_id = competition_id,
            category_id = category_id,
            trigger = trigger,
            participants = participants,
            duration_ms = duration_ms,
            "Ranking calculated"
        ),
        Err(error) => tracing::error!(
            competition_id = competition_id,
            category_id = category_id,
            trigger = trigger,
            duration_ms = duration_ms,
            error = error,
            "Ranking calculation failed"
        ),
    }
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `user_id` - Optional user ID
/// * `competition_id` - Optional competition the event concerns
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use lr_server::logging::log_security_event;
///
/// log_security_event(
///     "live_connection_denied",
///     None,
///     Some(12),
///     "Anonymous viewer on a private competition"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    user_id: Option<i64>,
    competition_id: Option<i64>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        competition_id = competition_id,
        "SECURITY: {}",
        message
    );
}

/// Log performance metric
///
/// Operations slower than a second are logged at warn.
///
/// ```
/// use lr_server::logging::log_performance;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... do work ...
/// let duration = start.elapsed().as_millis() as u64;
/// log_performance("broadcast_sweep", duration, Some("delivered=3"));
/// ```
pub fn log_performance(operation: &str, duration_ms: u64, metadata: Option<&str>) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "Performance metric"
        );
    }
}
