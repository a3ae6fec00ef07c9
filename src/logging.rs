//! Logging setup for the provider process.
//!
//! Logs go to **stderr**; stdout belongs to the host engine.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: explicit filter (e.g. `info`, `bigip_provider=debug`)
//! - `TF_LOG`: the host engine's log level, used when `RUST_LOG` is unset
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=bigip_provider=debug ./provider
//! TF_LOG=TRACE ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging with a custom default level, used when neither
/// `RUST_LOG` nor `TF_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(build_filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn build_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var("TF_LOG")
        .ok()
        .and_then(|value| tf_log_level(&value))
        .unwrap_or(default_level);
    EnvFilter::new(level)
}

/// Map a `TF_LOG` value onto a tracing level directive.
fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        // "JSON" and "1" are the engine's catch-alls for maximum verbosity.
        "JSON" | "1" => Some("trace"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter construction is tested here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("bigip_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,bigip_provider::client=trace").is_ok());
    }

    #[test]
    fn test_tf_log_mapping() {
        assert_eq!(tf_log_level("TRACE"), Some("trace"));
        assert_eq!(tf_log_level("debug"), Some("debug"));
        assert_eq!(tf_log_level(" Warn "), Some("warn"));
        assert_eq!(tf_log_level("JSON"), Some("trace"));
        assert_eq!(tf_log_level("off"), None);
        assert_eq!(tf_log_level(""), None);
    }
}
