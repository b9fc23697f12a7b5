//! Basic certificate checking example.
//!
//! Fetches the certificate of one service and prints its classification.
//!
//! Run with: cargo run --example basic_check -- mx.example.com

use chrono::Utc;
use tls_checker::{CertificateEvaluator, CertificateFetcher, FetchOptions, SystemResolver, TargetSpec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec: TargetSpec = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "example.com".to_string())
        .parse()?;
    let dns = SystemResolver::from_system_conf()?;

    println!("=== Certificate check for {} ({}:{}) ===\n", spec.host, spec.mode, spec.port);

    for target in spec.targets(&dns) {
        let mut fetcher = CertificateFetcher::new(target, FetchOptions::default());
        let outcome = fetcher.fetch_with(&dns).clone();
        let result = CertificateEvaluator::new().evaluate(&outcome, fetcher.target(), Utc::now());

        println!("Address: {}", fetcher.target().socket_addr());
        println!("State: {}", result.state);
        println!("Description: {}", result.description);
        if let Some(certificate) = outcome.certificate() {
            println!("Subject: {}", certificate.subject_name);
            println!("Issuer: {}", certificate.issuer_name);
            println!("Valid from: {}", certificate.not_before);
            println!("Valid to: {}", certificate.not_after);
            println!("Serial: {}", certificate.serial_number);
            println!("Subject Alternative Names (SANs):");
            for san in &certificate.subject_alt_names {
                println!("  - {}", san);
            }
        }
        println!();
    }

    Ok(())
}
