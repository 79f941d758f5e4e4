//! Logging initialization and configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is present.
pub const DEFAULT_FILTER: &str = "wa_sender=info,tower_http=info";

fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) if !level.is_empty() => EnvFilter::try_new(expand_level(level))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// A bare level such as `debug` applies to this crate and the HTTP trace layer;
/// full directives are passed through untouched.
fn expand_level(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("wa_sender={level},tower_http={level}")
    }
}

/// Initialize the logging system.
///
/// `level` is either a bare level (`info`, `debug`, ...) or a full
/// `EnvFilter` directive string. When `None`, `RUST_LOG` is consulted and
/// [`DEFAULT_FILTER`] is the fallback.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init(level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
}
