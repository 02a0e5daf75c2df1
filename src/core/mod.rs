//! # Core Module
//!
//! The classification engine, independent of any front end.
//!
//! ## Modules
//! - `source` - Local paths and remote URLs of archives
//! - `archive` - Parses WARC records and their HTTP heads
//! - `filter` - Decides which records carry an image worth scoring
//! - `digest` - Short content identifiers for payloads
//! - `dedup` - Client for the shared seen-before lookup service
//! - `reader` - Turns a source into a stream of accepted images
//! - `classifier` - Scores images
//! - `queue` - Bounded work queues with drain and close
//! - `output` - Renders results, one line each
//! - `pipeline` - Orchestrates the full workflow

pub mod archive;
pub mod classifier;
pub mod dedup;
pub mod digest;
pub mod filter;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod reader;
pub mod source;

// Re-export commonly used types
pub use classifier::{Classifier, ClassifierFactory, OnnxClassifier, FAILURE_SCORE};
pub use digest::ContentId;
pub use filter::RecordFilter;
pub use output::{ClassificationResult, OutputFormat};
pub use source::Source;
