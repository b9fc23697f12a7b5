//! Classification of a fetch outcome into `ok`, `warn` or `critical`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use strum_macros::Display;

use crate::error::CheckError;
use crate::fetcher::FetchOutcome;
use crate::humanize::{DistanceOfTime, Humanize};
use crate::target::CheckTarget;

/// A certificate expiring within this many days is critical.
pub const CRITICAL_DAYS_BEFORE_EXPIRY: i64 = 2;
/// A certificate expiring within this many days is a warning.
pub const WARNING_DAYS_BEFORE_EXPIRY: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum State {
    Ok,
    Warn,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub state: State,
    pub description: String,
    /// Seconds until `not_after`, negative once expired. Only set when a
    /// certificate was obtained.
    pub metric_seconds: Option<i64>,
}

impl CheckResult {
    fn critical(description: String) -> Self {
        CheckResult {
            state: State::Critical,
            description,
            metric_seconds: None,
        }
    }
}

/// Turns fetch outcomes into [`CheckResult`]s.
#[derive(Debug, Clone, Default)]
pub struct CertificateEvaluator<H = DistanceOfTime> {
    humanizer: H,
}

impl CertificateEvaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: Humanize> CertificateEvaluator<H> {
    pub fn with_humanizer(humanizer: H) -> Self {
        CertificateEvaluator { humanizer }
    }

    /// Classifies `outcome` for `target` as seen at `now`.
    ///
    /// Rules, first match wins: no certificate, hostname mismatch, not yet
    /// valid, expired are critical; expiring within 2 days is critical,
    /// within 14 days a warning; anything else is ok. A target without a
    /// hostname (IP literal) never matches the certificate subject.
    pub fn evaluate(
        &self,
        outcome: &FetchOutcome,
        target: &CheckTarget,
        now: DateTime<Utc>,
    ) -> CheckResult {
        let certificate = match outcome {
            FetchOutcome::Certificate(certificate) => certificate,
            FetchOutcome::ConnectionFailed(reason) => {
                return CheckResult::critical(reason.clone())
            }
            FetchOutcome::Timeout => {
                return CheckResult::critical(CheckError::RecvTimeout.to_string())
            }
            FetchOutcome::NoCertificate => {
                return CheckResult::critical(format!(
                    "{} does not have a valid certificate",
                    target.hostname.as_deref().unwrap_or_default()
                ))
            }
        };

        let remaining = certificate.not_after - now;
        let metric_seconds = Some(remaining.num_seconds());

        let subject_matches = target
            .hostname
            .as_deref()
            .is_some_and(|hostname| certificate.matches_hostname(hostname));
        if !subject_matches {
            return CheckResult {
                state: State::Critical,
                description: CheckError::HostnameMismatch.to_string(),
                metric_seconds,
            };
        }

        let (state, description) = if now < certificate.not_before {
            (
                State::Critical,
                format!(
                    "certificate will become valid in {}",
                    self.humanizer.humanize(certificate.not_before - now)
                ),
            )
        } else if now > certificate.not_after {
            (
                State::Critical,
                format!(
                    "certificate has expired {} ago",
                    self.humanizer.humanize(now - certificate.not_after)
                ),
            )
        } else {
            let state = if now + Duration::days(CRITICAL_DAYS_BEFORE_EXPIRY) > certificate.not_after
            {
                State::Critical
            } else if now + Duration::days(WARNING_DAYS_BEFORE_EXPIRY) > certificate.not_after {
                State::Warn
            } else {
                State::Ok
            };
            (
                state,
                format!(
                    "certificate will expire in {}",
                    self.humanizer.humanize(remaining)
                ),
            )
        };

        CheckResult {
            state,
            description,
            metric_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::FetchedCertificate;
    use crate::target::Mode;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn target(hostname: Option<&str>) -> CheckTarget {
        CheckTarget::new(
            hostname.map(str::to_owned),
            "2001:db8::1".parse().unwrap(),
            443,
            Mode::Raw,
        )
    }

    fn certificate(
        cn: Option<&str>,
        sans: &[&str],
        not_before: Duration,
        not_after: Duration,
    ) -> FetchOutcome {
        FetchOutcome::Certificate(FetchedCertificate {
            subject_common_name: cn.map(str::to_owned),
            subject_alt_names: sans.iter().map(|s| s.to_string()).collect(),
            not_before: now() + not_before,
            not_after: now() + not_after,
            serial_number: "1".to_owned(),
            subject_name: "/CN=example.com".to_owned(),
            issuer_name: "/CN=Example CA".to_owned(),
            raw_der: Vec::new(),
            public_key_der: Vec::new(),
        })
    }

    fn evaluate(outcome: &FetchOutcome, hostname: Option<&str>) -> CheckResult {
        CertificateEvaluator::new().evaluate(outcome, &target(hostname), now())
    }

    fn valid_until(not_after: Duration) -> CheckResult {
        let outcome = certificate(Some("example.com"), &[], -Duration::days(1), not_after);
        evaluate(&outcome, Some("example.com"))
    }

    #[test]
    fn test_valid_certificate_is_ok() {
        let result = valid_until(Duration::days(30));
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.description, "certificate will expire in about 1 month");
        assert_eq!(result.metric_seconds, Some(30 * 86_400));
    }

    #[test]
    fn test_expiring_soon_is_warn() {
        let result = valid_until(Duration::days(5));
        assert_eq!(result.state, State::Warn);
        assert_eq!(result.description, "certificate will expire in 5 days");
    }

    #[test]
    fn test_expiring_really_soon_is_critical() {
        let result = valid_until(Duration::hours(12));
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "certificate will expire in about 12 hours");
        assert_eq!(result.metric_seconds, Some(12 * 3_600));
    }

    #[test]
    fn test_expired_is_critical() {
        let result = valid_until(-Duration::hours(1));
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "certificate has expired about 1 hour ago");
        assert_eq!(result.metric_seconds, Some(-3_600));
    }

    #[test]
    fn test_window_boundaries() {
        assert_eq!(valid_until(Duration::days(14)).state, State::Ok);
        assert_eq!(
            valid_until(Duration::days(14) - Duration::seconds(1)).state,
            State::Warn
        );
        assert_eq!(valid_until(Duration::days(2)).state, State::Warn);
        assert_eq!(
            valid_until(Duration::days(2) - Duration::seconds(1)).state,
            State::Critical
        );
        assert_eq!(valid_until(Duration::zero()).state, State::Critical);
    }

    #[test]
    fn test_not_yet_valid_is_critical() {
        let outcome = certificate(
            Some("example.com"),
            &[],
            Duration::hours(1),
            Duration::days(365),
        );
        let result = evaluate(&outcome, Some("example.com"));
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "certificate will become valid in about 1 hour");
        assert_eq!(result.metric_seconds, Some(365 * 86_400));
    }

    #[test]
    fn test_hostname_mismatch_is_critical() {
        let outcome = certificate(
            Some("example.net"),
            &[],
            -Duration::days(1),
            Duration::days(30),
        );
        let result = evaluate(&outcome, Some("example.com"));
        assert_eq!(result.state, State::Critical);
        assert_eq!(
            result.description,
            "certificate subject does not match hostname"
        );
        assert_eq!(result.metric_seconds, Some(30 * 86_400));
    }

    #[test]
    fn test_hostname_matches_san() {
        let outcome = certificate(
            Some("example.net"),
            &["www.example.net", "example.com"],
            -Duration::days(1),
            Duration::days(30),
        );
        assert_eq!(evaluate(&outcome, Some("example.com")).state, State::Ok);
        assert_eq!(
            evaluate(&outcome, Some("mail.example.com")).state,
            State::Critical
        );
    }

    #[test]
    fn test_mismatch_wins_over_expiry() {
        let outcome = certificate(None, &[], -Duration::days(10), -Duration::days(1));
        let result = evaluate(&outcome, Some("example.com"));
        assert_eq!(
            result.description,
            "certificate subject does not match hostname"
        );
    }

    #[test]
    fn test_ip_literal_target_never_matches_subject() {
        let outcome = certificate(
            Some("example.net"),
            &["www.example.net"],
            -Duration::days(1),
            Duration::days(30),
        );
        let result = evaluate(&outcome, None);
        assert_eq!(result.state, State::Critical);
        assert_eq!(
            result.description,
            "certificate subject does not match hostname"
        );
        assert_eq!(result.metric_seconds, Some(30 * 86_400));
    }

    #[test]
    fn test_missing_certificate() {
        let result = evaluate(&FetchOutcome::NoCertificate, Some("example.com"));
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "example.com does not have a valid certificate");
        assert_eq!(result.metric_seconds, None);

        let result = evaluate(&FetchOutcome::NoCertificate, None);
        assert_eq!(result.description, " does not have a valid certificate");
    }

    #[test]
    fn test_failure_reason_is_reported() {
        let outcome = FetchOutcome::ConnectionFailed("Connection refused".to_owned());
        let result = evaluate(&outcome, Some("example.com"));
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "Connection refused");

        let result = evaluate(&FetchOutcome::Timeout, Some("example.com"));
        assert_eq!(result.state, State::Critical);
        assert_eq!(
            result.description,
            "Timeout while receiving message from socket"
        );
    }

    #[test]
    fn test_custom_humanizer() {
        struct Seconds;
        impl Humanize for Seconds {
            fn humanize(&self, duration: Duration) -> String {
                format!("{}s", duration.num_seconds())
            }
        }

        let outcome = certificate(
            Some("example.com"),
            &[],
            -Duration::days(1),
            Duration::minutes(2),
        );
        let result = CertificateEvaluator::with_humanizer(Seconds).evaluate(
            &outcome,
            &target(Some("example.com")),
            now(),
        );
        assert_eq!(result.description, "certificate will expire in 120s");
    }

    #[test]
    fn test_state_ordering_and_display() {
        assert!(State::Ok < State::Warn && State::Warn < State::Critical);
        assert_eq!(State::Warn.to_string(), "warn");
        assert_eq!(serde_json::to_string(&State::Critical).unwrap(), "\"critical\"");
    }
}
