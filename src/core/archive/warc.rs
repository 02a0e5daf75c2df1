//! Streaming WARC record reader.
//!
//! Legacy ARC files are read too. Each ARC record is presented as a WARC
//! `response` record (or `warcinfo` for the `filedesc://` version block),
//! so callers never see the difference.

use super::http::{read_line, HttpHead};
use super::{HeaderMap, Record};
use crate::error::ArchiveError;
use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Read};

/// First two bytes of every gzip member
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound on up-front payload allocation; larger payloads grow as read
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Record types whose block is an HTTP message
const HTTP_RECORD_KINDS: &[&str] = &["response", "request", "revisit"];

/// URI scheme of the ARC version block
const ARC_FILEDESC: &str = "filedesc://";

/// Fewest fields on an ARC record line (v1: url ip date mime length)
const ARC_MIN_FIELDS: usize = 5;

/// Reads WARC records one at a time from a byte stream.
///
/// Payload bytes that are not read before the next call to
/// [`WarcReader::next_record`] are skipped.
pub struct WarcReader<R> {
    inner: R,
    /// Unread bytes left in the current record's block
    remaining: u64,
    /// Largest decompressed HTTP body `read_payload` will produce
    body_limit: u64,
}

impl WarcReader<Box<dyn BufRead + Send>> {
    /// Open a stream, transparently decompressing `.warc.gz` input
    pub fn open<S: Read + Send + 'static>(source: S) -> Result<Self, ArchiveError> {
        let mut buffered = BufReader::new(source);
        let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

        let inner: Box<dyn BufRead + Send> = if is_gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        };

        Ok(Self::new(inner))
    }
}

impl<R: BufRead> WarcReader<R> {
    /// Wrap an already decompressed stream
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            body_limit: u64::MAX,
        }
    }

    /// Cap the size of decompressed HTTP bodies
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    /// Advance to the next record, or `None` at end of stream
    pub fn next_record(&mut self) -> Result<Option<Record>, ArchiveError> {
        self.skip_block()?;

        // Records are separated by CRLF CRLF; tolerate any number of blank lines
        let version = loop {
            let (line, n) = read_line(&mut self.inner)?;
            if n == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                break line;
            }
        };

        if !version.starts_with("WARC/") {
            return match parse_arc_line(&version) {
                Some(headers) => self.arc_record(headers).map(Some),
                None => Err(ArchiveError::UnsupportedVersion { line: version }),
            };
        }

        let mut headers = HeaderMap::new();
        loop {
            let (line, n) = read_line(&mut self.inner)?;
            if n == 0 {
                return Err(ArchiveError::Truncated);
            }
            if line.is_empty() {
                break;
            }
            headers.push_line(&line)?;
        }

        let length = content_length(&headers)?;
        self.remaining = length;

        let http = if length > 0 && has_http_block(&headers) {
            Some(self.parse_http_head()?)
        } else {
            None
        };

        Ok(Some(Record {
            headers,
            http,
            length,
        }))
    }

    /// Finish an ARC record whose header line has been mapped to WARC headers
    fn arc_record(&mut self, headers: HeaderMap) -> Result<Record, ArchiveError> {
        let length = content_length(&headers)?;
        self.remaining = length;

        let is_http = headers.get(super::WARC_TARGET_URI).is_some_and(|uri| {
            let uri = uri.to_ascii_lowercase();
            uri.starts_with("http:") || uri.starts_with("https:")
        });
        let http = if length > 0 && is_http {
            Some(self.parse_http_head()?)
        } else {
            None
        };

        Ok(Record {
            headers,
            http,
            length,
        })
    }

    fn parse_http_head(&mut self) -> Result<HttpHead, ArchiveError> {
        let mut block = (&mut self.inner).take(self.remaining);
        let (head, consumed) = HttpHead::parse(&mut block)?;
        self.remaining = self.remaining.saturating_sub(consumed);
        Ok(head)
    }

    /// Read the rest of the current record's payload.
    ///
    /// For HTTP records the body is de-chunked and decompressed. Calling
    /// this twice for the same record returns an empty payload the second
    /// time.
    pub fn read_payload(&mut self, record: &Record) -> Result<Vec<u8>, ArchiveError> {
        let mut raw = Vec::with_capacity(self.remaining.min(MAX_PREALLOC) as usize);
        let read = (&mut self.inner).take(self.remaining).read_to_end(&mut raw)? as u64;
        if read < self.remaining {
            return Err(ArchiveError::Truncated);
        }
        self.remaining = 0;

        Ok(match &record.http {
            Some(head) => head.decode_body(raw, self.body_limit),
            None => raw,
        })
    }

    fn skip_block(&mut self) -> Result<(), ArchiveError> {
        if self.remaining == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut (&mut self.inner).take(self.remaining), &mut io::sink())?;
        if skipped < self.remaining {
            return Err(ArchiveError::Truncated);
        }
        self.remaining = 0;
        Ok(())
    }
}

fn content_length(headers: &HeaderMap) -> Result<u64, ArchiveError> {
    headers
        .get("Content-Length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(ArchiveError::MissingContentLength)
}

/// Map an ARC record line to the WARC headers of the equivalent record.
///
/// The URL is the first field and the block length the last, which holds
/// for both ARC v1 and v2 lines.
fn parse_arc_line(line: &str) -> Option<HeaderMap> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < ARC_MIN_FIELDS {
        return None;
    }
    let uri = fields[0];
    let length = fields[fields.len() - 1];
    length.parse::<u64>().ok()?;

    let mut headers = HeaderMap::new();
    if uri.starts_with(ARC_FILEDESC) {
        headers.insert(super::WARC_TYPE, "warcinfo");
    } else {
        headers.insert(super::WARC_TYPE, "response");
        headers.insert(super::WARC_TARGET_URI, uri);
        headers.insert("WARC-IP-Address", fields[1]);
        headers.insert("WARC-Date", fields[2]);
    }
    headers.insert("Content-Length", length);
    Some(headers)
}

fn has_http_block(headers: &HeaderMap) -> bool {
    let kind = headers.get(super::WARC_TYPE).unwrap_or("");
    if !HTTP_RECORD_KINDS.contains(&kind) {
        return false;
    }
    match headers.get("Content-Type") {
        Some(content_type) => content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("application/http"),
        // Some crawlers omit the block type on responses
        None => kind == "response",
    }
}
