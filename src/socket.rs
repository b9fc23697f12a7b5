//! Line-oriented socket with bounded reads.
//!
//! STARTTLS negotiations are driven over a [`TimeoutLineSocket`]. Bytes are
//! consumed one at a time so nothing belonging to the following TLS
//! handshake is ever buffered here, and every read gives up with
//! [`CheckError::RecvTimeout`] instead of blocking forever.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::debug;
use regex::Regex;

use crate::error::CheckError;

/// Default time to wait for a single byte.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

// `set_read_timeout` rejects a zero duration.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// A connected TCP stream with byte and line oriented timed reads.
#[derive(Debug)]
pub struct TimeoutLineSocket {
    stream: TcpStream,
    timeout: Duration,
}

impl TimeoutLineSocket {
    pub fn new(stream: TcpStream, timeout: Duration) -> Self {
        TimeoutLineSocket {
            stream,
            timeout: timeout.max(MIN_WAIT),
        }
    }

    /// Returns the next byte sent by the peer.
    ///
    /// A non-blocking read is tried first; when nothing is pending the
    /// socket is waited on for at most the configured timeout and the read
    /// is retried once.
    pub fn read_byte(&mut self) -> Result<u8, CheckError> {
        if let Some(byte) = self.try_read_byte()? {
            return Ok(byte);
        }
        if !self.wait_readable()? {
            return Err(CheckError::RecvTimeout);
        }
        self.try_read_byte()?.ok_or(CheckError::RecvTimeout)
    }

    /// Reads bytes until the buffer ends with CR LF.
    ///
    /// The returned line includes the terminator. Invalid UTF-8 is replaced
    /// rather than rejected: only line prefixes are ever inspected.
    pub fn read_line(&mut self) -> Result<String, CheckError> {
        let mut line = Vec::new();
        while !line.ends_with(b"\r\n") {
            line.push(self.read_byte()?);
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        debug!("S: {}", line.trim_end());
        Ok(line)
    }

    /// Reads lines, discarding them, until one matches `pattern`.
    pub fn read_line_until_match(&mut self, pattern: &Regex) -> Result<String, CheckError> {
        loop {
            let line = self.read_line()?;
            if pattern.is_match(&line) {
                return Ok(line);
            }
        }
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CheckError> {
        (0..len).map(|_| self.read_byte()).collect()
    }

    /// Writes `data` followed by CR LF.
    pub fn write_line(&mut self, data: &str) -> Result<(), CheckError> {
        debug!("C: {}", data);
        self.write_all(format!("{data}\r\n").as_bytes())
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), CheckError> {
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Gives the underlying stream back, e.g. to start TLS on it.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>, CheckError> {
        let mut buf = [0u8; 1];
        self.stream.set_nonblocking(true)?;
        let read = self.stream.read(&mut buf);
        self.stream.set_nonblocking(false)?;

        match read {
            Ok(0) => Err(CheckError::ConnectionClosed),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Blocks until data (or EOF) is pending, for at most the timeout.
    fn wait_readable(&mut self) -> Result<bool, CheckError> {
        let previous = self.stream.read_timeout()?;
        self.stream.set_read_timeout(Some(self.timeout))?;
        let mut probe = [0u8; 1];
        let ready = match self.stream.peek(&mut probe) {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        };
        self.stream.set_read_timeout(previous)?;
        ready
    }
}
