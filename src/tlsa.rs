//! TLSA records (RFC 6698) and their matching against a fetched certificate.
//!
//! Only end-entity records (certificate usage 1) are considered. A service
//! spread over several addresses may legitimately publish one record per
//! certificate, so a record that does not match is not an error: callers
//! keep the matching subset and report on that.

use std::fmt;

use log::{debug, warn};
use openssl::sha::{sha256, sha512};

use crate::certificate::FetchedCertificate;
use crate::error::TlsaError;
use crate::resolver::DnsLookup;
use crate::target::CheckTarget;

/// The only certificate usage acted upon.
pub const END_ENTITY_USAGE: u8 = 1;

pub const SELECTOR_FULL_CERTIFICATE: u8 = 0;
pub const SELECTOR_PUBLIC_KEY: u8 = 1;

pub const MATCHING_EXACT: u8 = 0;
pub const MATCHING_SHA256: u8 = 1;
pub const MATCHING_SHA512: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TlsaRecord {
    pub certificate_usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    pub associated_data: Vec<u8>,
}

impl TlsaRecord {
    /// Parses TLSA RDATA: usage, selector and matching type bytes followed
    /// by the certificate association data.
    pub fn parse(rdata: &[u8]) -> Result<Self, TlsaError> {
        match rdata {
            [certificate_usage, selector, matching_type, associated_data @ ..] => Ok(TlsaRecord {
                certificate_usage: *certificate_usage,
                selector: *selector,
                matching_type: *matching_type,
                associated_data: associated_data.to_vec(),
            }),
            _ => Err(TlsaError::MalformedTlsaRecord { len: rdata.len() }),
        }
    }

    pub fn header_bytes(&self) -> [u8; 3] {
        [self.certificate_usage, self.selector, self.matching_type]
    }

    pub fn is_end_entity(&self) -> bool {
        self.certificate_usage == END_ENTITY_USAGE
    }

    /// True when this end-entity record pins `certificate`.
    ///
    /// Unknown selectors and matching types never match.
    pub fn matches(&self, certificate: &FetchedCertificate) -> bool {
        if !self.is_end_entity() {
            return false;
        }

        let selected: &[u8] = match self.selector {
            SELECTOR_FULL_CERTIFICATE => &certificate.raw_der,
            SELECTOR_PUBLIC_KEY => &certificate.public_key_der,
            _ => return false,
        };

        match self.matching_type {
            MATCHING_EXACT => selected == self.associated_data.as_slice(),
            MATCHING_SHA256 => sha256(selected)[..] == self.associated_data[..],
            MATCHING_SHA512 => sha512(selected)[..] == self.associated_data[..],
            _ => false,
        }
    }
}

impl fmt::Display for TlsaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.certificate_usage,
            self.selector,
            self.matching_type,
            hex::encode(&self.associated_data)
        )
    }
}

/// Owner name of the TLSA records of a service: `_<port>._tcp.<hostname>.`
pub fn tlsa_name(port: u16, hostname: &str) -> String {
    format!("_{port}._tcp.{hostname}.")
}

/// End-entity TLSA records published for `target`.
///
/// Targets without hostname have no TLSA records. Malformed records are
/// skipped.
pub fn end_entity_records(target: &CheckTarget, dns: &dyn DnsLookup) -> Vec<TlsaRecord> {
    let hostname = match &target.hostname {
        Some(hostname) => hostname,
        None => return Vec::new(),
    };
    let name = tlsa_name(target.port, hostname);

    dns.lookup_tlsa(&name)
        .iter()
        .filter_map(|rdata| match TlsaRecord::parse(rdata) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("{name}: {e}");
                None
            }
        })
        .filter(|record| {
            if !record.is_end_entity() {
                debug!("{name}: ignoring TLSA record with usage {}", record.certificate_usage);
            }
            record.is_end_entity()
        })
        .collect()
}

/// The records of `records` that match `certificate`.
pub fn matching_records(
    records: Vec<TlsaRecord>,
    certificate: &FetchedCertificate,
) -> Vec<TlsaRecord> {
    records
        .into_iter()
        .filter(|record| record.matches(certificate))
        .collect()
}
