//! DNS lookups needed around a check.
//!
//! Addresses for a service name, TLSA RDATA for `_<port>._tcp.<name>.` and
//! the reverse name used in SMTP `EHLO`. Lookup failures are logged and
//! reported as empty answers.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Mutex;

use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::proto::serialize::binary::BinEncodable;
use hickory_resolver::Resolver;
use log::{debug, warn};

/// DNS questions asked by the checker.
pub trait DnsLookup: Send + Sync {
    /// All IPv4 and IPv6 addresses of `host`.
    fn lookup_addresses(&self, host: &str) -> Vec<IpAddr>;

    /// Raw TLSA (type 52) RDATA found at `name`.
    fn lookup_tlsa(&self, name: &str) -> Vec<Vec<u8>>;

    /// The PTR name of `address`, without the trailing dot.
    fn reverse_lookup(&self, address: IpAddr) -> Option<String>;
}

/// Resolver configured from the operating system (`/etc/resolv.conf`).
pub struct SystemResolver {
    resolver: Resolver,
}

impl SystemResolver {
    pub fn from_system_conf() -> io::Result<Self> {
        Ok(SystemResolver {
            resolver: Resolver::from_system_conf()?,
        })
    }
}

impl DnsLookup for SystemResolver {
    fn lookup_addresses(&self, host: &str) -> Vec<IpAddr> {
        match self.resolver.lookup_ip(host) {
            Ok(response) => response.iter().collect(),
            Err(e) => {
                warn!("Failed to resolve {host}: {e}");
                Vec::new()
            }
        }
    }

    fn lookup_tlsa(&self, name: &str) -> Vec<Vec<u8>> {
        match self.resolver.lookup(name, RecordType::TLSA) {
            Ok(lookup) => lookup
                .iter()
                .filter(|rdata| matches!(rdata, RData::TLSA(_)))
                .filter_map(|rdata| match rdata.to_bytes() {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("Skipping undecodable TLSA answer for {name}: {e}");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                debug!("No TLSA records for {name}: {e}");
                Vec::new()
            }
        }
    }

    fn reverse_lookup(&self, address: IpAddr) -> Option<String> {
        match self.resolver.reverse_lookup(address) {
            Ok(response) => response
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_owned()),
            Err(e) => {
                debug!("Reverse lookup of {address} failed: {e}");
                None
            }
        }
    }
}

/// In-memory zone, for tests and offline runs.
///
/// Every question asked is recorded and available through
/// [`StaticResolver::queries`].
#[derive(Debug, Default)]
pub struct StaticResolver {
    addresses: HashMap<String, Vec<IpAddr>>,
    tlsa: HashMap<String, Vec<Vec<u8>>>,
    names: HashMap<IpAddr, String>,
    queries: Mutex<Vec<String>>,
}

impl StaticResolver {
    /// Adds address records. Entries that are not IP literals are ignored.
    #[must_use]
    pub fn with_addresses(mut self, host: &str, addresses: &[&str]) -> Self {
        self.addresses.insert(
            host.to_owned(),
            addresses.iter().filter_map(|a| a.parse().ok()).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_tlsa(mut self, name: &str, rdata: Vec<u8>) -> Self {
        self.tlsa.entry(name.to_owned()).or_default().push(rdata);
        self
    }

    #[must_use]
    pub fn with_ptr(mut self, address: IpAddr, name: &str) -> Self {
        self.names.insert(address, name.to_owned());
        self
    }

    /// Questions asked so far, as `TYPE name`.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }

    fn record(&self, query: String) {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query);
        }
    }
}

impl DnsLookup for StaticResolver {
    fn lookup_addresses(&self, host: &str) -> Vec<IpAddr> {
        self.record(format!("A/AAAA {host}"));
        self.addresses.get(host).cloned().unwrap_or_default()
    }

    fn lookup_tlsa(&self, name: &str) -> Vec<Vec<u8>> {
        self.record(format!("TLSA {name}"));
        self.tlsa.get(name).cloned().unwrap_or_default()
    }

    fn reverse_lookup(&self, address: IpAddr) -> Option<String> {
        self.record(format!("PTR {address}"));
        self.names.get(&address).cloned()
    }
}
