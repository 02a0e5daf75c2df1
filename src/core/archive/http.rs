//! HTTP message heads and payload decoding inside WARC blocks.

use super::HeaderMap;
use crate::error::ArchiveError;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use std::io::{BufRead, Read};

/// Parsed HTTP status/request line and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHead {
    /// The first line, e.g. `HTTP/1.1 200 OK`
    pub status_line: String,
    pub headers: HeaderMap,
}

impl HttpHead {
    /// Numeric status code of a response, if the status line has one
    pub fn status_code(&self) -> Option<u16> {
        self.status_line.split_whitespace().nth(1)?.parse().ok()
    }

    /// Header value lookup, case-insensitive
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Media type without parameters, trimmed and lowercased
    pub fn content_type(&self) -> Option<String> {
        self.get("Content-Type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase()
        })
    }

    /// Read a head from `reader`, returning it with the number of bytes consumed
    pub(crate) fn parse<R: BufRead>(reader: &mut R) -> Result<(Self, u64), ArchiveError> {
        let mut consumed = 0u64;
        let (status_line, n) = read_line(reader)?;
        consumed += n;

        if !status_line.starts_with("HTTP/") && !status_line.contains(" HTTP/") {
            return Err(ArchiveError::MalformedHttp {
                reason: format!("unexpected start line {status_line:?}"),
            });
        }

        let mut headers = HeaderMap::new();
        loop {
            let (line, n) = read_line(reader)?;
            consumed += n;
            if n == 0 || line.is_empty() {
                break;
            }
            // Junk without a colon is dropped
            let _ = headers.push_line(&line);
        }

        Ok((
            Self {
                status_line,
                headers,
            },
            consumed,
        ))
    }

    /// Undo transfer and content encodings on a raw HTTP body.
    ///
    /// Bodies that fail to decode, or that would decompress to more than
    /// `limit` bytes, are returned as captured.
    pub fn decode_body(&self, raw: Vec<u8>, limit: u64) -> Vec<u8> {
        let chunked = self
            .get("Transfer-Encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));

        let body = if chunked {
            match dechunk(&raw) {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Keeping raw body: {}", e);
                    raw
                }
            }
        } else {
            raw
        };

        let encoding = self
            .get("Content-Encoding")
            .map(|v| v.trim().to_ascii_lowercase());

        match encoding.as_deref() {
            Some("gzip" | "x-gzip") => {
                decompress(MultiGzDecoder::new(&body[..]), limit).unwrap_or(body)
            }
            Some("deflate") => decompress(ZlibDecoder::new(&body[..]), limit)
                .or_else(|| decompress(DeflateDecoder::new(&body[..]), limit))
                .unwrap_or(body),
            _ => body,
        }
    }
}

/// Inflate at most `limit` bytes; `None` on corrupt input or overflow
fn decompress<R: Read>(decoder: R, limit: u64) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .ok()?;
    if out.len() as u64 > limit {
        tracing::debug!("Body inflates past {} bytes, keeping it compressed", limit);
        return None;
    }
    Some(out)
}

/// Read one CRLF/LF terminated line, returning it without the terminator
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> Result<(String, u64), ArchiveError> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok((String::from_utf8_lossy(&buf).into_owned(), n as u64))
}

/// Decode an HTTP/1.1 chunked body
fn dechunk(raw: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;

    loop {
        let line_end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| ArchiveError::InvalidChunk {
                reason: "missing chunk size line".to_string(),
            })?;
        let size_line = String::from_utf8_lossy(&rest[..line_end]);
        let size_field = size_line.trim().split(';').next().unwrap_or_default();
        let size = usize::from_str_radix(size_field.trim(), 16).map_err(|_| {
            ArchiveError::InvalidChunk {
                reason: format!("bad chunk size {size_field:?}"),
            }
        })?;
        rest = &rest[line_end + 1..];

        if size == 0 {
            return Ok(out);
        }
        if rest.len() < size {
            return Err(ArchiveError::InvalidChunk {
                reason: format!("chunk of {} bytes but only {} remain", size, rest.len()),
            });
        }

        out.extend_from_slice(&rest[..size]);
        rest = &rest[size..];
        rest = rest.strip_prefix(b"\r\n").or_else(|| rest.strip_prefix(b"\n")).unwrap_or(rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const LIMIT: u64 = 1 << 20;

    fn head(raw: &str) -> HttpHead {
        HttpHead::parse(&mut Cursor::new(raw.as_bytes())).unwrap().0
    }

    #[test]
    fn parses_status_and_headers() {
        let raw = "HTTP/1.1 404 Not Found\r\nContent-Type: image/png\r\n\r\nbody";
        let (parsed, consumed) = HttpHead::parse(&mut Cursor::new(raw.as_bytes())).unwrap();

        assert_eq!(parsed.status_code(), Some(404));
        assert_eq!(parsed.get("content-type"), Some("image/png"));
        assert_eq!(consumed as usize, raw.len() - "body".len());
    }

    #[test]
    fn content_type_strips_parameters_and_case() {
        let parsed = head("HTTP/1.1 200 OK\r\nContent-Type:  Image/JPEG; charset=x\r\n\r\n");
        assert_eq!(parsed.content_type().as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn unparseable_status_has_no_code() {
        let parsed = head("HTTP/1.1 abc OK\r\n\r\n");
        assert_eq!(parsed.status_code(), None);
    }

    #[test]
    fn rejects_non_http_start_line() {
        let result = HttpHead::parse(&mut Cursor::new(b"GIF89a...\r\n\r\n".as_slice()));
        assert!(result.is_err());
    }

    #[test]
    fn decodes_chunked_body() {
        let parsed = head("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
        let body = parsed.decode_body(b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n".to_vec(), LIMIT);
        assert_eq!(body, b"Wikipedia");
    }

    #[test]
    fn bad_chunking_keeps_raw_body() {
        let parsed = head("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
        let raw = b"zz\r\nnot chunked".to_vec();
        assert_eq!(parsed.decode_body(raw.clone(), LIMIT), raw);
    }

    #[test]
    fn decodes_gzip_content_encoding() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"image bytes").unwrap();
        let compressed = encoder.finish().unwrap();

        let parsed = head("HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\n\r\n");
        assert_eq!(parsed.decode_body(compressed, LIMIT), b"image bytes");
    }

    #[test]
    fn oversized_gzip_body_is_kept_compressed() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![0u8; 64 * 1024]).unwrap();
        let compressed = encoder.finish().unwrap();

        let parsed = head("HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\n\r\n");
        assert_eq!(parsed.decode_body(compressed.clone(), 1000), compressed);
    }

    #[test]
    fn body_at_limit_is_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[7u8; 1000]).unwrap();
        let compressed = encoder.finish().unwrap();

        let parsed = head("HTTP/1.1 200 OK\r\nContent-Encoding: x-gzip\r\n\r\n");
        assert_eq!(parsed.decode_body(compressed, 1000), vec![7u8; 1000]);
    }
}
