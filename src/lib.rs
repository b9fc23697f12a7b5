//! Certificate probe for TLS endpoints.
//!
//! A check connects to one address of a service, upgrades the connection to
//! TLS (directly, through SMTP or IMAP `STARTTLS`, or through the LDAP
//! StartTLS extended operation), captures the certificate offered by the
//! peer and classifies it as `ok`, `warn` or `critical` according to its
//! validity window and hostname. TLSA records published in the DNS for the
//! service can additionally be matched against the captured certificate.
//!
//! Trust is never verified: this crate only reports what the peer presents.
//!
//! # Example
//!
//! ```no_run
//! use tls_checker::{run_check, CheckOptions, SystemResolver, TargetSpec};
//!
//! let dns = SystemResolver::from_system_conf()?;
//! let spec: TargetSpec = "mx.example.com".parse()?;
//! for target in spec.targets(&dns) {
//!     let report = run_check(target, &CheckOptions::default(), &dns, chrono::Utc::now());
//!     println!("{}: {}", report.result.state, report.result.description);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod fetcher;
pub mod handshake;
pub mod humanize;
pub mod resolver;
pub mod socket;
pub mod target;
pub mod tlsa;

use chrono::{DateTime, Utc};
use log::debug;

pub use certificate::FetchedCertificate;
pub use error::{CheckError, TlsaError};
pub use evaluator::{CertificateEvaluator, CheckResult, State};
pub use event::Event;
pub use fetcher::{CertificateFetcher, FetchOptions, FetchOutcome};
pub use handshake::Handshake;
pub use humanize::{DistanceOfTime, Humanize};
pub use resolver::{DnsLookup, SystemResolver};
pub use target::{CheckTarget, Mode, TargetError, TargetSpec};
pub use tlsa::TlsaRecord;

/// Settings for a complete check of one target.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub fetch: FetchOptions,
    /// Look up and match TLSA records when the target has a hostname
    pub tlsa: bool,
}

/// Everything learned about one target.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub target: CheckTarget,
    pub outcome: FetchOutcome,
    pub result: CheckResult,
    /// End-entity TLSA records matching the fetched certificate
    pub tlsa_matches: Vec<TlsaRecord>,
}

impl CheckReport {
    /// The certificate event followed by one event per matching TLSA record.
    pub fn events(&self) -> Vec<Event> {
        let mut events = vec![Event::for_certificate(
            &self.target,
            &self.result,
            &self.outcome,
        )];
        if let FetchOutcome::Certificate(certificate) = &self.outcome {
            events.extend(
                self.tlsa_matches
                    .iter()
                    .map(|record| Event::for_tlsa(&self.target, record, certificate)),
            );
        }
        events
    }
}

/// Runs the full pipeline for `target`: fetch, evaluate, match TLSA records.
///
/// This never fails: every transport problem ends up as a `critical`
/// [`CheckResult`].
pub fn run_check(
    target: CheckTarget,
    options: &CheckOptions,
    dns: &dyn DnsLookup,
    now: DateTime<Utc>,
) -> CheckReport {
    let mut fetcher = CertificateFetcher::new(target, options.fetch.clone());
    let outcome = fetcher.fetch_with(dns).clone();
    let target = fetcher.into_target();
    let result = CertificateEvaluator::new().evaluate(&outcome, &target, now);

    let tlsa_matches = match (&outcome, options.tlsa) {
        (FetchOutcome::Certificate(certificate), true) => {
            tlsa::matching_records(tlsa::end_entity_records(&target, dns), certificate)
        }
        _ => Vec::new(),
    };
    debug!(
        "{}: {} ({} matching TLSA records)",
        target,
        result.state,
        tlsa_matches.len()
    );

    CheckReport {
        target,
        outcome,
        result,
        tlsa_matches,
    }
}
