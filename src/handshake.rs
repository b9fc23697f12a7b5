//! Plaintext negotiations that precede the TLS handshake.
//!
//! Each [`Handshake`] takes a freshly connected stream and returns it at the
//! exact point where the peer expects a TLS `ClientHello`.

use std::net::{IpAddr, TcpStream};
use std::time::Duration;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::error::CheckError;
use crate::resolver::DnsLookup;
use crate::socket::TimeoutLineSocket;
use crate::target::Mode;

/// LDAPMessage { messageID 1, ExtendedRequest { requestName 1.3.6.1.4.1.1466.20037 } }
pub const LDAP_STARTTLS_REQUEST: &[u8; 31] =
    b"\x30\x1d\x02\x01\x01\x77\x18\x80\x161.3.6.1.4.1.1466.20037";

/// LDAPMessage { messageID 1, ExtendedResponse { success, "", "" } }
///
/// Only this exact encoding is accepted. Servers that add a `responseName`
/// or answer with any other result code are reported as a mismatch.
pub const LDAP_STARTTLS_SUCCESS: &[u8; 14] =
    b"\x30\x0c\x02\x01\x01\x78\x07\x0a\x01\x00\x04\x00\x04\x00";

lazy_static! {
    static ref SMTP_GREETING: Regex = Regex::new(r"^220 ").unwrap();
    static ref SMTP_EHLO_DONE: Regex = Regex::new(r"^250 ").unwrap();
    static ref IMAP_GREETING: Regex = Regex::new(r"^\* OK").unwrap();
    static ref IMAP_TAGGED_OK: Regex = Regex::new(r"^\. OK").unwrap();
}

/// Negotiation performed before TLS, one variant per supported protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Raw,
    Smtp {
        /// Name announced in `EHLO`
        ehlo_name: String,
    },
    Imap,
    Ldap,
}

impl Handshake {
    /// Builds the handshake for `mode`. `ehlo_name` is only called for SMTP.
    pub fn for_mode<F>(mode: Mode, ehlo_name: F) -> Handshake
    where
        F: FnOnce() -> String,
    {
        match mode {
            Mode::Raw => Handshake::Raw,
            Mode::Smtp => Handshake::Smtp {
                ehlo_name: ehlo_name(),
            },
            Mode::Imap => Handshake::Imap,
            Mode::Ldap => Handshake::Ldap,
        }
    }

    /// Runs the negotiation on `stream` and hands it back ready for TLS.
    ///
    /// `read_timeout` bounds every single read.
    pub fn negotiate(
        &self,
        stream: TcpStream,
        read_timeout: Duration,
    ) -> Result<TcpStream, CheckError> {
        if let Handshake::Raw = self {
            return Ok(stream);
        }

        let mut socket = TimeoutLineSocket::new(stream, read_timeout);
        match self {
            Handshake::Raw => {}
            Handshake::Smtp { ehlo_name } => smtp(&mut socket, ehlo_name)?,
            Handshake::Imap => imap(&mut socket)?,
            Handshake::Ldap => ldap(&mut socket)?,
        }
        Ok(socket.into_inner())
    }
}

fn smtp(socket: &mut TimeoutLineSocket, ehlo_name: &str) -> Result<(), CheckError> {
    socket.read_line_until_match(&SMTP_GREETING)?;
    socket.write_line(&format!("EHLO {ehlo_name}"))?;
    socket.read_line_until_match(&SMTP_EHLO_DONE)?;
    socket.write_line("STARTTLS")?;
    // Usually "220 Ready to start TLS". A refusal shows up as a TLS failure.
    socket.read_line()?;
    Ok(())
}

fn imap(socket: &mut TimeoutLineSocket) -> Result<(), CheckError> {
    socket.read_line_until_match(&IMAP_GREETING)?;
    socket.write_line(". CAPABILITY")?;
    socket.read_line_until_match(&IMAP_TAGGED_OK)?;
    socket.write_line(". STARTTLS")?;
    socket.read_line_until_match(&IMAP_TAGGED_OK)?;
    Ok(())
}

fn ldap(socket: &mut TimeoutLineSocket) -> Result<(), CheckError> {
    debug!("C: LDAP StartTLS extended request");
    socket.write_all(LDAP_STARTTLS_REQUEST)?;

    let response = socket.read_bytes(LDAP_STARTTLS_SUCCESS.len())?;
    if response != LDAP_STARTTLS_SUCCESS {
        return Err(CheckError::HandshakeProtocolMismatch {
            protocol: "LDAP",
            received: hex::encode(&response),
        });
    }
    debug!("S: LDAP StartTLS success");
    Ok(())
}

/// Name this machine announces in SMTP `EHLO`.
///
/// The local hostname is resolved and its first address reverse-resolved.
/// Any failure degrades to the bare hostname, then to `localhost`.
pub fn local_hostname(dns: &dyn DnsLookup) -> String {
    let hostname = match hostname::get().ok().and_then(|h| h.into_string().ok()) {
        Some(hostname) => hostname,
        None => return "localhost".to_owned(),
    };

    let address: Option<IpAddr> = dns.lookup_addresses(&hostname).into_iter().next();
    address
        .and_then(|address| dns.reverse_lookup(address))
        .unwrap_or(hostname)
}
