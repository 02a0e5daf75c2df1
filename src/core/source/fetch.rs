//! Remote archive retrieval.

use crate::error::SourceError;
use reqwest::blocking::Client;
use std::io::{Seek, SeekFrom};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Download `url` completely into a new temporary file.
///
/// The returned file is rewound to the start.
pub fn fetch_to_tempfile(url: &str) -> Result<NamedTempFile, SourceError> {
    let fetch_error = |reason: String| SourceError::Fetch {
        url: url.to_string(),
        reason,
    };

    tracing::info!("Fetching {}", url);

    let client = Client::builder()
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_error(e.to_string()))?;

    let mut temp = NamedTempFile::new().map_err(|e| fetch_error(e.to_string()))?;
    let bytes = response
        .copy_to(temp.as_file_mut())
        .map_err(|e| fetch_error(e.to_string()))?;
    temp.as_file_mut()
        .seek(SeekFrom::Start(0))
        .map_err(|e| fetch_error(e.to_string()))?;

    tracing::debug!("Fetched {} bytes from {}", bytes, url);
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response on a random local port
    fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            stream.write_all(response).unwrap();
        });
        format!("http://{}/crawl.warc", addr)
    }

    #[test]
    fn downloads_body_into_tempfile() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\nWARC/1.0",
        );

        let mut temp = fetch_to_tempfile(&url).unwrap();
        let mut contents = String::new();
        temp.read_to_string(&mut contents).unwrap();

        assert_eq!(contents, "WARC/1.0");
    }

    #[test]
    fn http_error_status_is_a_fetch_error() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );

        let error = fetch_to_tempfile(&url).unwrap_err();
        assert!(matches!(error, SourceError::Fetch { .. }));
        assert!(error.to_string().contains(&url));
    }
}
