//! # Source Module
//!
//! Archive locations handed to the readers.
//!
//! A source is either a local path or an `http:`/`https:` URL. Remote
//! archives are downloaded completely into a temporary file before
//! parsing starts; the file is removed when the opened source is dropped.

mod fetch;

pub use fetch::fetch_to_tempfile;

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// One archive location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    /// Classify a command-line argument as a path or a URL
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http:") || arg.starts_with("https:") {
            Source::Remote(arg.to_string())
        } else {
            Source::Local(PathBuf::from(arg))
        }
    }

    /// Open the archive for reading, downloading it first if remote
    pub fn open(&self) -> Result<OpenedSource, SourceError> {
        match self {
            Source::Local(path) => {
                let file = File::open(path).map_err(|e| SourceError::Open {
                    path: path.clone(),
                    source: e,
                })?;
                Ok(OpenedSource {
                    file,
                    download: None,
                })
            }
            Source::Remote(url) => {
                let download = fetch_to_tempfile(url)?;
                let file = download.reopen().map_err(|e| SourceError::Open {
                    path: download.path().to_path_buf(),
                    source: e,
                })?;
                Ok(OpenedSource {
                    file,
                    download: Some(download),
                })
            }
        }
    }
}

impl From<&str> for Source {
    fn from(arg: &str) -> Self {
        Source::parse(arg)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Local(path) => write!(f, "{}", path.display()),
            Source::Remote(url) => f.write_str(url),
        }
    }
}

/// A readable archive file, plus the temporary download backing it
#[derive(Debug)]
pub struct OpenedSource {
    file: File,
    download: Option<NamedTempFile>,
}

impl OpenedSource {
    /// Split into the readable file and the guard that owns any download
    pub fn into_parts(self) -> (File, Option<NamedTempFile>) {
        (self.file, self.download)
    }
}
