use lazy_static::lazy_static;
use log::{debug, warn};
use prometheus::{labels, register_gauge, Gauge};

use tls_checker::{CheckReport, State};

lazy_static! {
    static ref TLS_CHECKER_SECONDS_BEFORE_EXPIRY: Gauge = register_gauge!(
        "tls_checker_seconds_before_expiry",
        "seconds before certificate expiration"
    )
    .unwrap();
    static ref TLS_CHECKER_STATE: Gauge = register_gauge!(
        "tls_checker_state",
        "check state (0 ok, 1 warn, 2 critical)"
    )
    .unwrap();
    static ref TLS_CHECKER_TLSA_MATCHES: Gauge = register_gauge!(
        "tls_checker_tlsa_matches",
        "end-entity TLSA records matching the certificate"
    )
    .unwrap();
}

pub fn state_value(state: State) -> f64 {
    match state {
        State::Ok => 0.0,
        State::Warn => 1.0,
        State::Critical => 2.0,
    }
}

/// Function to push metrics to prometheus
/// # Arguments
/// * `reports` - Check reports, one push per report
/// * `prometheus_address` - Push gateway base address
pub fn prometheus_metrics(reports: &[CheckReport], prometheus_address: &str) {
    for report in reports {
        // no certificate reports zero seconds
        TLS_CHECKER_SECONDS_BEFORE_EXPIRY.set(report.result.metric_seconds.unwrap_or(0) as f64);
        TLS_CHECKER_STATE.set(state_value(report.result.state));
        TLS_CHECKER_TLSA_MATCHES.set(report.tlsa_matches.len() as f64);

        let metric_families = prometheus::gather();
        let push = prometheus::push_metrics(
            "tls_checker",
            labels! {
                "instance".to_owned() => "tls-checker".to_owned(),
                "service".to_owned() => tls_checker::event::service(&report.target),
                "host".to_owned() => report.target.display_name(),
                "address".to_owned() => report.target.address.to_string(),
                "port".to_owned() => report.target.port.to_string(),
                "mode".to_owned() => report.target.mode.to_string(),
                "state".to_owned() => report.result.state.to_string(),
            },
            &format!("{}/metrics/job", prometheus_address),
            metric_families,
            None,
        );

        match push {
            Ok(_) => debug!("Pushed metrics for {}", report.target),
            Err(e) => warn!("Failed to push metrics to prometheus: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_value() {
        assert_eq!(state_value(State::Ok), 0.0);
        assert_eq!(state_value(State::Warn), 1.0);
        assert_eq!(state_value(State::Critical), 2.0);
    }
}
