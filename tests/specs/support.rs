//! Shared setup for the end-to-end scenario tests.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a `tracing` subscriber so `RUST_LOG=pipeworks_engine=debug cargo
/// test` shows worker lifecycle logs. Safe to call from every test; only
/// the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "pipeworks_engine=debug".into()),
            )
            .with_test_writer()
            .init();
    });
}
