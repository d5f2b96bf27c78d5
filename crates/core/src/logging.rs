use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs a global subscriber writing to stderr. `RUST_LOG` takes precedence
/// over `default_filter`. A subscriber installed earlier is left in place.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}

static TEST_LOGGING: Once = Once::new();

/// Routes events through the test harness's captured output, once per process.
pub fn init_test_logging() {
    TEST_LOGGING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer().with_ansi(false))
            .try_init();
    });
}
