//! Case-insensitive header storage shared by WARC and HTTP heads.

use crate::error::ArchiveError;

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any earlier value with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse one `Name: value` line and append it.
    ///
    /// A line starting with whitespace continues the previous header's value.
    pub(crate) fn push_line(&mut self, line: &str) -> Result<(), ArchiveError> {
        if line.starts_with(|c: char| c == ' ' || c == '\t') {
            if let Some((_, value)) = self.entries.last_mut() {
                let continued = line.trim();
                if !continued.is_empty() {
                    value.push(' ');
                    value.push_str(continued);
                }
                return Ok(());
            }
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ArchiveError::MalformedHeader {
                line: line.to_string(),
            })?;
        self.insert(name.trim(), value.trim());
        Ok(())
    }
}
