//! Subscriber installation for test binaries.
//!
//! `RUST_LOG` wins over the default filter. Installing twice is harmless:
//! the second call reports `false` and leaves the first subscriber in place.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a text subscriber; true if this call installed it
pub fn init_tracing(default_filter: &str) -> bool {
    init_tracing_with(default_filter, LogFormat::Text)
}

/// Install a subscriber in the given format; true if this call installed it
pub fn init_tracing_with(default_filter: &str, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(filter(default_filter));
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_test_writer())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    result.is_ok()
}
