//! Fetching the certificate a service presents.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use log::{debug, warn};
use openssl::ssl::{HandshakeError, Ssl, SslContext, SslMethod, SslVerifyMode};
use openssl::x509::X509;

use crate::certificate::FetchedCertificate;
use crate::error::CheckError;
use crate::handshake::{local_hostname, Handshake};
use crate::resolver::{DnsLookup, StaticResolver};
use crate::socket::DEFAULT_READ_TIMEOUT;
use crate::target::CheckTarget;

/// Default time allowed for the TCP connection to be established.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one attempt at getting a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Certificate(FetchedCertificate),
    /// A connection was made but no certificate was presented
    NoCertificate,
    /// The connection or the negotiation failed; the reason is user facing
    ConnectionFailed(String),
    /// The peer stopped answering in the middle of the negotiation
    Timeout,
}

impl FetchOutcome {
    pub fn certificate(&self) -> Option<&FetchedCertificate> {
        match self {
            FetchOutcome::Certificate(certificate) => Some(certificate),
            _ => None,
        }
    }

    fn from_error(error: CheckError) -> Self {
        match error {
            CheckError::RecvTimeout => FetchOutcome::Timeout,
            CheckError::NoCertificatePresented => FetchOutcome::NoCertificate,
            other => FetchOutcome::ConnectionFailed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Bound on every single read during the plaintext negotiation and TLS
    pub read_timeout: Duration,
    /// Name announced in SMTP `EHLO`; derived from the local hostname if unset
    pub ehlo_name: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ehlo_name: None,
        }
    }
}

/// Fetches the certificate of one target, at most once.
///
/// The first call to [`fetch`](Self::fetch) or [`fetch_with`](Self::fetch_with)
/// connects; later calls return the cached outcome.
#[derive(Debug)]
pub struct CertificateFetcher {
    target: CheckTarget,
    options: FetchOptions,
    outcome: Option<FetchOutcome>,
}

impl CertificateFetcher {
    pub fn new(target: CheckTarget, options: FetchOptions) -> Self {
        CertificateFetcher {
            target,
            options,
            outcome: None,
        }
    }

    pub fn target(&self) -> &CheckTarget {
        &self.target
    }

    pub fn into_target(self) -> CheckTarget {
        self.target
    }

    /// The cached outcome, if a fetch already happened.
    pub fn outcome(&self) -> Option<&FetchOutcome> {
        self.outcome.as_ref()
    }

    /// Fetches without DNS: SMTP announces the bare local hostname.
    pub fn fetch(&mut self) -> &FetchOutcome {
        self.fetch_with(&StaticResolver::default())
    }

    /// Fetches, using `dns` to work out the SMTP `EHLO` name.
    pub fn fetch_with(&mut self, dns: &dyn DnsLookup) -> &FetchOutcome {
        self.outcome
            .get_or_insert_with(|| match retrieve(&self.target, &self.options, dns) {
                Ok(Some(x509)) => match FetchedCertificate::from_x509(&x509) {
                    Ok(certificate) => FetchOutcome::Certificate(certificate),
                    Err(e) => {
                        warn!("{}: unusable certificate: {}", self.target, e);
                        FetchOutcome::NoCertificate
                    }
                },
                Ok(None) => FetchOutcome::NoCertificate,
                Err(e) => {
                    debug!("{}: {}", self.target, e);
                    FetchOutcome::from_error(e)
                }
            })
    }
}

fn retrieve(
    target: &CheckTarget,
    options: &FetchOptions,
    dns: &dyn DnsLookup,
) -> Result<Option<X509>, CheckError> {
    let address = target.socket_addr();
    let stream = TcpStream::connect_timeout(&address, options.connect_timeout)
        .map_err(|e| CheckError::from_connect(address, e))?;
    stream.set_read_timeout(Some(options.read_timeout))?;
    stream.set_write_timeout(Some(options.read_timeout))?;
    debug!("{}: connected", target);

    let handshake = Handshake::for_mode(target.mode, || match &options.ehlo_name {
        Some(name) => name.clone(),
        None => local_hostname(dns),
    });
    let stream = handshake.negotiate(stream, options.read_timeout)?;

    peer_certificate(stream, target.hostname.as_deref())
}

/// Runs a TLS client handshake on `stream` and returns the peer certificate.
///
/// The handshake does not need to complete: a certificate received before a
/// failure (for instance when the server insists on a client certificate) is
/// still returned.
fn peer_certificate(
    stream: TcpStream,
    hostname: Option<&str>,
) -> Result<Option<X509>, CheckError> {
    let mut context = SslContext::builder(SslMethod::tls())?;
    // Only the certificate matters here, not whether it is trusted.
    context.set_verify(SslVerifyMode::NONE);
    let context = context.build();

    let mut ssl = Ssl::new(&context)?;
    if let Some(hostname) = hostname {
        ssl.set_hostname(hostname)?;
    }

    match ssl.connect(stream) {
        Ok(tls) => Ok(tls.ssl().peer_certificate()),
        Err(HandshakeError::SetupFailure(e)) => Err(e.into()),
        Err(HandshakeError::Failure(mid)) | Err(HandshakeError::WouldBlock(mid)) => {
            if let Some(certificate) = mid.ssl().peer_certificate() {
                warn!("TLS handshake failed after certificate exchange: {}", mid.error());
                return Ok(Some(certificate));
            }
            match mid.error().io_error() {
                Some(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    Err(CheckError::RecvTimeout)
                }
                Some(e) => Err(io::Error::new(e.kind(), e.to_string()).into()),
                None => {
                    debug!("TLS handshake failed: {}", mid.error());
                    Err(CheckError::NoCertificatePresented)
                }
            }
        }
    }
}
