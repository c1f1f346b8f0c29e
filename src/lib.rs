pub mod backend;
pub mod convert;
pub mod error;
pub mod files;
pub mod ingest;
pub mod progress;
pub mod settings;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{BackendError, CoreError};
pub use state::AppState;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
