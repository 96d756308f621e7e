//! Shared helpers for integration tests

use std::sync::Once;

static TRACING: Once = Once::new();

/// Route library logs to the test harness output (once per test binary)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .try_init();
    });
}
