//! # WARC Image Classifier
//!
//! Pulls images out of web archives and scores each one with a neural
//! classifier, printing one line per image.
//!
//! ## Flow
//! Archive readers parse sources in parallel, keep the records that look
//! like images, skip anything the shared dedup service has seen before,
//! and queue the rest. Classification workers score queued images and a
//! single printer writes the results.
//!
//! ## Architecture
//! - `core` - The extraction and classification engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, WarcClassifierError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Logs go to
/// stderr so they never mix with results on stdout. `RUST_LOG` takes
/// precedence over the default level.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
