//! # Filter Module
//!
//! Decides which archive records carry images worth classifying.
//!
//! A record is accepted only if it is a `response` with HTTP headers, a
//! declared length inside the configured range, a 2xx status and one of
//! the allowed content types. Everything else is skipped silently.

use crate::core::archive::Record;
use std::collections::HashSet;

/// Default smallest accepted record, in bytes
pub const DEFAULT_MIN_LENGTH: u64 = 2000;
/// Default largest accepted record, in bytes
pub const DEFAULT_MAX_LENGTH: u64 = 100_000_000;
/// Default accepted content types
pub const DEFAULT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/bmp", "image/gif"];

/// Filters archive records down to image responses
#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Smallest declared length accepted (inclusive)
    min_length: u64,
    /// Largest declared length accepted (inclusive)
    max_length: u64,
    /// Lowercased media types to accept
    types: HashSet<String>,
}

impl RecordFilter {
    /// Create a filter with the default length range and image types
    pub fn new() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
            types: DEFAULT_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Override the accepted declared-length range (both ends inclusive)
    pub fn with_length_range(mut self, min_length: u64, max_length: u64) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    /// Override the list of content types to accept
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.types = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn min_length(&self) -> u64 {
        self.min_length
    }

    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    /// Check if a record should be extracted
    pub fn should_include(&self, record: &Record) -> bool {
        if record.kind() != "response" {
            return false;
        }

        let Some(http) = &record.http else {
            return false;
        };

        if !(self.min_length..=self.max_length).contains(&record.length) {
            return false;
        }

        match http.status_code() {
            Some(code) if (200..300).contains(&code) => {}
            _ => return false,
        }

        http.content_type()
            .is_some_and(|content_type| self.types.contains(&content_type))
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new()
    }
}
