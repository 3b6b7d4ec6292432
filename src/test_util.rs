use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a fmt subscriber for test output, once per test binary.
pub fn trace_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}
