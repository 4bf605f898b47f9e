use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `tracing` subscriber honoring `RUST_LOG`, defaulting to `info`.
///
/// Called once from each binary's `main`; safe to call more than once within
/// a process (e.g. from tests), later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
