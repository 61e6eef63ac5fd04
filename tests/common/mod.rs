//! Shared setup for the integration suites.

/// Installs a fmt subscriber honoring `RUST_LOG`, once per test binary.
///
/// Repeated calls are no-ops so every test can request it unconditionally.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
