//! TLSA matching example.
//!
//! Checks a service and lists the end-entity TLSA records that pin the
//! certificate it presents.
//!
//! Run with: cargo run --example tlsa_check -- mx.example.com:25

use chrono::Utc;
use tls_checker::{run_check, CheckOptions, SystemResolver, TargetSpec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec: TargetSpec = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mx.example.com".to_string())
        .parse()?;
    let dns = SystemResolver::from_system_conf()?;
    let options = CheckOptions {
        tlsa: true,
        ..CheckOptions::default()
    };

    for target in spec.targets(&dns) {
        let report = run_check(target, &options, &dns, Utc::now());
        for event in report.events() {
            println!("{:<8} {} {}", event.state.to_string(), event.service, event.description);
        }
    }

    Ok(())
}
