//! # Dedup Module
//!
//! Client for the external "seen before?" lookup service.
//!
//! ## Wire Protocol
//! One synchronous exchange per query over a persistent TCP connection:
//! - request: `C` + 16-character identifier + byte `0x01`
//! - response: one byte; `N` means already recorded, anything else means
//!   the service has just recorded it and the image should be classified
//!
//! The query is a check-and-insert. There is no acknowledgement of the
//! insert and no retry.

use crate::error::DedupError;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Conditional-store command byte
const CMD_CONDITIONAL_STORE: u8 = b'C';
/// Record terminator, also marking the digest as queued for classification
const QUEUED_FOR_CLASSIFICATION: u8 = 1;
/// Response byte for an identifier the service already holds
const ALREADY_SEEN: u8 = b'N';
/// Length of a content identifier on the wire
const ID_LEN: usize = 16;

/// Outcome of a dedup query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    /// The service already had this identifier; skip classification
    Seen,
    /// The service recorded the identifier just now; classify it
    New,
}

/// One lazily connected, persistent connection to the dedup service.
///
/// Each reader owns its own client; nothing is shared between threads.
#[derive(Debug)]
pub struct DedupClient {
    addr: String,
    timeout: Option<Duration>,
    stream: Option<TcpStream>,
}

impl DedupClient {
    /// Create a client for `host:port`. No connection is made yet.
    pub fn new(addr: impl Into<String>) -> Result<Self, DedupError> {
        let addr = addr.into();
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => return Err(DedupError::InvalidAddress { addr }),
        }
        Ok(Self {
            addr,
            timeout: None,
            stream: None,
        })
    }

    /// Apply a connect/read/write timeout to every exchange
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Ask the service whether `digest` has been seen, recording it if not.
    ///
    /// On any I/O failure the connection is dropped; the next call
    /// reconnects.
    pub fn check_and_record(&mut self, digest: &str) -> Result<DedupVerdict, DedupError> {
        if digest.len() != ID_LEN {
            return Err(DedupError::InvalidIdentifier {
                digest: digest.to_string(),
            });
        }

        let mut request = Vec::with_capacity(ID_LEN + 2);
        request.push(CMD_CONDITIONAL_STORE);
        request.extend_from_slice(digest.as_bytes());
        request.push(QUEUED_FOR_CLASSIFICATION);

        let result = self.exchange(&request);
        if result.is_err() {
            self.stream = None;
        }

        match result? {
            ALREADY_SEEN => Ok(DedupVerdict::Seen),
            _ => Ok(DedupVerdict::New),
        }
    }

    fn exchange(&mut self, request: &[u8]) -> Result<u8, DedupError> {
        let stream = self.connection()?;
        stream.write_all(request)?;
        stream.flush()?;

        let mut response = [0u8; 1];
        stream.read_exact(&mut response)?;
        Ok(response[0])
    }

    fn connection(&mut self) -> Result<&mut TcpStream, DedupError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = self.connect()?;
                tracing::debug!("Connected to dedup service at {}", self.addr);
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }

    fn connect(&self) -> Result<TcpStream, DedupError> {
        let connect_error = |source: std::io::Error| DedupError::Connect {
            addr: self.addr.clone(),
            source,
        };

        let stream = match self.timeout {
            Some(timeout) => {
                let mut last_error = None;
                let mut connected = None;
                for addr in self.addr.to_socket_addrs().map_err(connect_error)? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                connected.ok_or_else(|| {
                    connect_error(last_error.unwrap_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::AddrNotAvailable,
                            "address resolved to nothing",
                        )
                    }))
                })?
            }
            None => TcpStream::connect(&self.addr).map_err(connect_error)?,
        };

        stream.set_nodelay(true).map_err(connect_error)?;
        stream.set_read_timeout(self.timeout).map_err(connect_error)?;
        stream.set_write_timeout(self.timeout).map_err(connect_error)?;
        Ok(stream)
    }
}
