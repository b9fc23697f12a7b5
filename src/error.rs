//! Error types for certificate fetching and TLSA parsing.
//!
//! Every error defined here is recovered before it reaches the user: the
//! fetcher turns a [`CheckError`] into a [`FetchOutcome`](crate::FetchOutcome)
//! and the TLSA matcher turns a [`TlsaError`] into "does not match".

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Transport and handshake failures raised while acquiring a certificate.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The peer actively refused the TCP connection
    #[error("Connection refused - connect(2) for {address}")]
    ConnectionRefused {
        /// The address the connection was attempted to
        address: SocketAddr,
    },

    /// The TCP connection could not be established within the connect timeout
    #[error("Connection timed out - connect(2) for {address}")]
    ConnectionTimedOut {
        /// The address the connection was attempted to
        address: SocketAddr,
    },

    /// No byte arrived within the read timeout
    #[error("Timeout while receiving message from socket")]
    RecvTimeout,

    /// The peer closed the connection while we were waiting for data
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// The peer answered the upgrade request with something we do not accept
    #[error("{protocol} StartTLS negotiation failed: unexpected response {received}")]
    HandshakeProtocolMismatch {
        /// Which negotiation was running
        protocol: &'static str,
        /// Hex rendering of the bytes received
        received: String,
    },

    /// The TLS session completed (or aborted) without a peer certificate
    #[error("No certificate presented by peer")]
    NoCertificatePresented,

    /// The peer certificate could not be decoded
    #[error("Certificate could not be decoded: {reason}")]
    InvalidCertificate {
        /// What was wrong with it
        reason: String,
    },

    /// The certificate does not cover the requested hostname
    #[error("certificate subject does not match hostname")]
    HostnameMismatch,

    /// OpenSSL failed outside of the handshake itself
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    /// Any other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CheckError {
    /// Classifies an I/O error raised while connecting to `address`.
    pub fn from_connect(address: SocketAddr, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused { address },
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Self::ConnectionTimedOut { address }
            }
            _ => Self::Io(err),
        }
    }
}

/// Failures parsing TLSA resource record data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlsaError {
    /// The record is shorter than its 3-byte header
    #[error("malformed TLSA record: expected at least 3 bytes, got {len}")]
    MalformedTlsaRecord {
        /// Length of the payload received
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let address: SocketAddr = "192.0.2.1:443".parse().unwrap();
        let err = CheckError::ConnectionRefused { address };
        assert_eq!(
            err.to_string(),
            "Connection refused - connect(2) for 192.0.2.1:443"
        );
        assert_eq!(
            CheckError::RecvTimeout.to_string(),
            "Timeout while receiving message from socket"
        );
    }

    #[test]
    fn test_connect_error_classification() {
        let address: SocketAddr = "[2001:db8::1]:25".parse().unwrap();

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            CheckError::from_connect(address, refused),
            CheckError::ConnectionRefused { .. }
        ));

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        let err = CheckError::from_connect(address, timed_out);
        assert!(matches!(err, CheckError::ConnectionTimedOut { .. }));
        assert_eq!(
            err.to_string(),
            "Connection timed out - connect(2) for [2001:db8::1]:25"
        );

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            CheckError::from_connect(address, other),
            CheckError::Io(_)
        ));
    }

    #[test]
    fn test_tlsa_error_display() {
        let err = TlsaError::MalformedTlsaRecord { len: 2 };
        assert_eq!(
            err.to_string(),
            "malformed TLSA record: expected at least 3 bytes, got 2"
        );
    }
}
