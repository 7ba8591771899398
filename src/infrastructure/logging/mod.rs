//! Tracing/logging setup.
//!
//! Stderr output always; optional non-blocking daily-rotated file output
//! when a log directory is configured. `RUST_LOG` overrides the
//! configured level.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::LoggingConfig;

/// Initialize the global subscriber. The returned guard must be kept
/// alive for the lifetime of the process when file logging is enabled.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let stderr_layer = if config.format == "json" {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chronos.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).json())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so this
    // exercises the layer construction path rather than init() itself.
    #[test]
    fn test_file_appender_writes_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let appender =
            tracing_appender::rolling::daily(dir.path(), "chronos.log");
        let (_writer, guard) = tracing_appender::non_blocking(appender);
        drop(guard);
        // Rolling appenders create files lazily; directory stays usable.
        assert!(dir.path().exists());
    }
}
