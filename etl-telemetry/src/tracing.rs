use std::io;
use std::sync::Once;

use etl_config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that switches on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Level applied to every target when `RUST_LOG` is not set.
const DEFAULT_LEVEL: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to install global tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the non blocking log writer alive.
///
/// Buffered log lines are flushed when the value is dropped, so it must be held until the
/// process is about to exit.
#[must_use = "logs are lost when the flusher is dropped early"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Initializes tracing for a binary.
///
/// The filter is read from `RUST_LOG` and falls back to `info`. Production environments log
/// JSON lines, development environments log human readable lines without targets.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load().map_err(TracingError::Environment)?;
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{DEFAULT_LEVEL},{}={DEFAULT_LEVEL}", crate_target(app_name)))
    });

    if environment.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(writer))
            .try_init()?;
    }

    Ok(LogFlusher { _guard: guard })
}

/// Initializes tracing for tests when `ENABLE_TRACING` is set.
///
/// Safe to call from every test, only the first call installs a subscriber.
pub fn init_test_tracing() {
    if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
        return;
    }

    INIT_TEST_TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Binary names use dashes while tracing targets use the crate's underscore form.
fn crate_target(app_name: &str) -> String {
    app_name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_names_map_to_targets() {
        assert_eq!(crate_target("etl-runner"), "etl_runner");
        assert_eq!(crate_target("runner"), "runner");
    }
}
