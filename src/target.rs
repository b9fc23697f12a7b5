//! Check targets and the `host[:port[:mode]]` notation used to name them.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::resolver::DnsLookup;

/// How the connection is brought to the point where TLS starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    /// TLS from the first byte
    Raw,
    /// SMTP `STARTTLS` (RFC 3207)
    Smtp,
    /// IMAP `STARTTLS` (RFC 3501)
    Imap,
    /// LDAP StartTLS extended operation (RFC 4511)
    Ldap,
}

impl Mode {
    /// Mode conventionally used on a well-known port.
    pub fn for_port(port: u16) -> Mode {
        match port {
            25 => Mode::Smtp,
            143 => Mode::Imap,
            389 => Mode::Ldap,
            _ => Mode::Raw,
        }
    }
}

/// One address of one service to check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckTarget {
    /// Absent when the target was given as an IP literal
    pub hostname: Option<String>,
    pub address: IpAddr,
    pub port: u16,
    pub mode: Mode,
}

impl CheckTarget {
    pub fn new(hostname: Option<String>, address: IpAddr, port: u16, mode: Mode) -> Self {
        CheckTarget {
            hostname,
            address,
            port,
            mode,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// The hostname, or the address when there is none.
    pub fn display_name(&self) -> String {
        match &self.hostname {
            Some(hostname) => hostname.clone(),
            None => self.address.to_string(),
        }
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.hostname.as_deref().unwrap_or(""),
            self.socket_addr(),
            self.mode
        )
    }
}

/// Errors in a target specification string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty host in target '{0}'")]
    EmptyHost(String),
    #[error("invalid port '{port}' in target '{spec}'")]
    InvalidPort { spec: String, port: String },
    #[error("unknown mode '{mode}' in target '{spec}' (expected raw, smtp, imap or ldap)")]
    UnknownMode { spec: String, mode: String },
    #[error("unterminated IPv6 literal in target '{0}'")]
    UnterminatedBracket(String),
}

/// A parsed `host[:port[:mode]]` specification.
///
/// IPv6 literals must be bracketed when a port follows: `[2001:db8::1]:443`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
}

impl TargetSpec {
    /// Port guessed from the first label of a service hostname.
    pub fn default_port(host: &str) -> u16 {
        const PREFIXES: [(&str, u16); 5] = [
            ("smtp.", 25),
            ("mx.", 25),
            ("imap.", 143),
            ("ldap.", 389),
            ("puppet.", 8140),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| host.starts_with(prefix))
            .map_or(443, |&(_, port)| port)
    }

    /// Expands the specification into one target per address.
    ///
    /// An IP literal yields a single target without hostname and without any
    /// DNS query. A name that does not resolve yields no target.
    pub fn targets(&self, dns: &dyn DnsLookup) -> Vec<CheckTarget> {
        if let Ok(address) = self.host.parse::<IpAddr>() {
            return vec![CheckTarget::new(None, address, self.port, self.mode)];
        }

        dns.lookup_addresses(&self.host)
            .into_iter()
            .map(|address| {
                CheckTarget::new(Some(self.host.clone()), address, self.port, self.mode)
            })
            .collect()
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (host, rest) = if let Some(bracketed) = spec.strip_prefix('[') {
            let end = bracketed
                .find(']')
                .ok_or_else(|| TargetError::UnterminatedBracket(spec.to_owned()))?;
            let rest = &bracketed[end + 1..];
            (&bracketed[..end], rest.strip_prefix(':'))
        } else {
            match spec.split_once(':') {
                Some((host, rest)) => (host, Some(rest)),
                None => (spec, None),
            }
        };

        if host.is_empty() {
            return Err(TargetError::EmptyHost(spec.to_owned()));
        }

        let (port, mode) = match rest {
            Some(rest) => match rest.split_once(':') {
                Some((port, mode)) => (Some(port), Some(mode)),
                None => (Some(rest), None),
            },
            None => (None, None),
        };

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| TargetError::InvalidPort {
                spec: spec.to_owned(),
                port: port.to_owned(),
            })?,
            None => Self::default_port(host),
        };

        let mode = match mode {
            Some(mode) => mode.parse::<Mode>().map_err(|_| TargetError::UnknownMode {
                spec: spec.to_owned(),
                mode: mode.to_owned(),
            })?,
            None => Mode::for_port(port),
        };

        Ok(TargetSpec {
            host: host.to_owned(),
            port,
            mode,
        })
    }
}
