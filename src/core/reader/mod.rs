//! # Reader Module
//!
//! Turns one archive source into a lazy stream of images to classify.
//!
//! ## Steps per record
//! 1. **Filter** - skip anything that is not a 2xx image response of sane size
//! 2. **Read** - pull the full payload into memory
//! 3. **Digest** - derive the content identifier
//! 4. **Dedup** - ask the lookup service, if configured, and skip repeats
//!
//! ## Example
//! ```rust,ignore
//! let mut reader = ArchiveReader::new(RecordFilter::new(), None);
//! for item in reader.read(&Source::parse("crawl.warc.gz"))? {
//!     let item = item?;
//!     println!("{} {}", item.digest, item.url);
//! }
//! ```

use crate::core::archive::WarcReader;
use crate::core::dedup::{DedupClient, DedupVerdict};
use crate::core::digest::ContentId;
use crate::core::filter::RecordFilter;
use crate::core::source::Source;
use crate::error::SourceError;
use std::io::BufRead;
use tempfile::NamedTempFile;

/// An image accepted for classification
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// The captured URI the image was served from
    pub url: String,
    pub digest: ContentId,
    /// Encoded image bytes as served
    pub image: Vec<u8>,
}

/// Extracts images from archive sources.
///
/// Owns the dedup connection for the thread it runs on, so one reader
/// must not be shared between threads.
pub struct ArchiveReader {
    filter: RecordFilter,
    dedup: Option<DedupClient>,
}

impl ArchiveReader {
    pub fn new(filter: RecordFilter, dedup: Option<DedupClient>) -> Self {
        Self { filter, dedup }
    }

    /// Open a source and return the images it contains.
    ///
    /// Remote sources are downloaded completely before this returns.
    pub fn read(&mut self, source: &Source) -> Result<AcceptedImages<'_>, SourceError> {
        let (file, download) = source.open()?.into_parts();
        let records = WarcReader::open(file)?.with_body_limit(self.filter.max_length());

        Ok(AcceptedImages {
            records,
            filter: &self.filter,
            dedup: self.dedup.as_mut(),
            _download: download,
            finished: false,
            duplicates_skipped: 0,
        })
    }
}

/// Lazy, non-restartable sequence of accepted images from one source.
///
/// Yields at most one error, after which the sequence ends.
pub struct AcceptedImages<'a> {
    records: WarcReader<Box<dyn BufRead + Send>>,
    filter: &'a RecordFilter,
    dedup: Option<&'a mut DedupClient>,
    /// Keeps a downloaded archive on disk until reading finishes
    _download: Option<NamedTempFile>,
    finished: bool,
    duplicates_skipped: usize,
}

impl AcceptedImages<'_> {
    /// Images the dedup service reported as already seen so far
    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates_skipped
    }

    fn next_accepted(&mut self) -> Result<Option<WorkItem>, SourceError> {
        while let Some(record) = self.records.next_record()? {
            if !self.filter.should_include(&record) {
                continue;
            }

            let image = self.records.read_payload(&record)?;
            let digest = ContentId::compute(&image, record.payload_digest());

            if let Some(dedup) = &mut self.dedup {
                if dedup.check_and_record(digest.as_str())? == DedupVerdict::Seen {
                    tracing::trace!("Skipping already seen {}", digest);
                    self.duplicates_skipped += 1;
                    continue;
                }
            }

            return Ok(Some(WorkItem {
                url: record.target_uri().unwrap_or_default().to_string(),
                digest,
                image,
            }));
        }
        Ok(None)
    }
}

impl Iterator for AcceptedImages<'_> {
    type Item = Result<WorkItem, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_accepted() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
