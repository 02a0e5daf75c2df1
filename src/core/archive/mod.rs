//! # Archive Module
//!
//! Reads records out of WARC container files.
//!
//! ## Supported Inputs
//! - WARC/1.0 and WARC/1.1
//! - Legacy ARC v1/v2, read as WARC `response` records
//! - Uncompressed or gzip-compressed (one gzip member per record)
//!
//! ## Example
//! ```rust,ignore
//! use warc_image_classifier::core::archive::WarcReader;
//!
//! let mut reader = WarcReader::open(file)?;
//! while let Some(record) = reader.next_record()? {
//!     if record.kind() == "response" {
//!         let payload = reader.read_payload(&record)?;
//!     }
//! }
//! ```

mod headers;
mod http;
mod warc;

pub use headers::HeaderMap;
pub use http::HttpHead;
pub use warc::WarcReader;

/// WARC header naming the record type
pub const WARC_TYPE: &str = "WARC-Type";
/// WARC header naming the captured URI
pub const WARC_TARGET_URI: &str = "WARC-Target-URI";
/// WARC header carrying the payload digest
pub const WARC_PAYLOAD_DIGEST: &str = "WARC-Payload-Digest";

/// One record from a WARC file, without its payload.
///
/// The payload is a one-shot stream owned by the [`WarcReader`] that
/// produced the record; read it with [`WarcReader::read_payload`] before
/// asking for the next record.
#[derive(Debug, Clone)]
pub struct Record {
    /// WARC-level headers
    pub headers: HeaderMap,
    /// Parsed HTTP status line and headers, for HTTP response/request records
    pub http: Option<HttpHead>,
    /// Declared block length (WARC `Content-Length`)
    pub length: u64,
}

impl Record {
    /// The record type (`response`, `request`, `warcinfo`, ...)
    pub fn kind(&self) -> &str {
        self.headers.get(WARC_TYPE).unwrap_or("")
    }

    /// The captured URI, if recorded
    pub fn target_uri(&self) -> Option<&str> {
        self.headers.get(WARC_TARGET_URI)
    }

    /// The archive-supplied payload digest, if recorded
    pub fn payload_digest(&self) -> Option<&str> {
        self.headers.get(WARC_PAYLOAD_DIGEST)
    }
}
