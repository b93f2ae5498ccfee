//! Tracing setup shared by the fedprobe binaries.
//!
//! `RUST_LOG` controls filtering, `RUST_LOG_FORMAT=json` switches the output
//! to JSON lines so round summaries can be shipped to a log collector.

use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        let raw = var("RUST_LOG_FORMAT")
            .inspect_err(|error| {
                // Unset is the common case, only complain about garbage.
                if matches!(error, std::env::VarError::NotUnicode(_)) {
                    warn!("Failed to read RUST_LOG_FORMAT, falling back to compact: {error}")
                }
            })
            .unwrap_or_default();

        match raw.as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize tracing at INFO unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Initialize tracing with `level` as the default directive.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
