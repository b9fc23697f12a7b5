//! Monitoring events built from check results.

use serde::Serialize;

use crate::certificate::FetchedCertificate;
use crate::evaluator::{CheckResult, State};
use crate::fetcher::FetchOutcome;
use crate::target::CheckTarget;
use crate::tlsa::TlsaRecord;

/// How long an event stays fresh, in seconds.
pub const EVENT_TTL: u64 = 12 * 3600;

pub const EVENT_TAG: &str = "tls-checker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub state: State,
    pub description: String,
    pub service: String,
    pub ttl: u64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
}

/// `X.509/<hostname>/<address>:<port>`, IPv6 addresses in brackets.
pub fn service(target: &CheckTarget) -> String {
    format!(
        "X.509/{}/{}",
        target.hostname.as_deref().unwrap_or(""),
        target.socket_addr()
    )
}

impl Event {
    fn new(state: State, description: String, service: String) -> Self {
        Event {
            state,
            description,
            service,
            ttl: EVENT_TTL,
            tags: vec![EVENT_TAG.to_owned()],
            metric: None,
            subject: None,
            issuer: None,
            serial: None,
            not_before: None,
            not_after: None,
        }
    }

    #[must_use]
    fn with_certificate(mut self, certificate: &FetchedCertificate) -> Self {
        self.subject = Some(certificate.subject_name.clone());
        self.issuer = Some(certificate.issuer_name.clone());
        self.serial = Some(certificate.serial_number.clone());
        self.not_before = Some(certificate.not_before.to_rfc3339());
        self.not_after = Some(certificate.not_after.to_rfc3339());
        self
    }

    pub fn for_certificate(
        target: &CheckTarget,
        result: &CheckResult,
        outcome: &FetchOutcome,
    ) -> Self {
        let mut event = Event::new(result.state, result.description.clone(), service(target));
        if let Some(certificate) = outcome.certificate() {
            event = event.with_certificate(certificate);
            event.metric = result.metric_seconds;
        }
        event
    }

    /// Event for a TLSA record that matches `certificate`.
    pub fn for_tlsa(
        target: &CheckTarget,
        record: &TlsaRecord,
        certificate: &FetchedCertificate,
    ) -> Self {
        Event::new(
            State::Ok,
            format!("certificate matches TLSA record {record}"),
            format!("{}/TLSA", service(target)),
        )
        .with_certificate(certificate)
    }
}
