//! # Error Module
//!
//! Error types for the archive classification pipeline.
//!
//! ## Design Principles
//! - **Never panic** on archive data - return errors instead
//! - **Include context** - paths, URLs, service addresses
//! - **Contain failures** - per-source and per-image errors stay inside
//!   their stage; only setup errors reach the caller

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error.
///
/// Source and archive errors never reach this level; readers log them
/// and move on to the next source.
#[derive(Error, Debug)]
pub enum WarcClassifierError {
    #[error("Dedup service error: {0}")]
    Dedup(#[from] DedupError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that abort processing of a single archive source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Dedup lookup failed: {0}")]
    Dedup(#[from] DedupError),
}

/// Errors raised while parsing WARC records
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error while reading archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Expected a WARC version line or ARC record header, found {line:?}")]
    UnsupportedVersion { line: String },

    #[error("Malformed header line: {line:?}")]
    MalformedHeader { line: String },

    #[error("Record is missing a valid Content-Length header")]
    MissingContentLength,

    #[error("Archive ended in the middle of a record")]
    Truncated,

    #[error("Malformed HTTP message in record: {reason}")]
    MalformedHttp { reason: String },

    #[error("Malformed chunked payload: {reason}")]
    InvalidChunk { reason: String },
}

/// Errors talking to the dedup lookup service
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Invalid dedup service address {addr:?} (expected host:port)")]
    InvalidAddress { addr: String },

    #[error("Failed to connect to dedup service at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dedup service I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identifier {digest:?} is not 16 characters")]
    InvalidIdentifier { digest: String },
}

/// Errors from the classification engine
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Failed to decode image: {reason}")]
    Decode { reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Errors from work queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue has been closed")]
    Closed,

    #[error("task_done() called more times than items were put")]
    TooManyTaskDone,
}

/// Errors that terminate the whole run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to spawn {role} thread: {source}")]
    Spawn {
        role: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{role} thread panicked")]
    Panicked { role: String },

    #[error("At least one {role} is required")]
    NoThreads { role: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, WarcClassifierError>;
