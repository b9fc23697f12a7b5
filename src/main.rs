mod metrics;

use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use clap::{ArgAction, Parser};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use log::{debug, error, info};

use tls_checker::config::{Config, OutputFormat};
use tls_checker::{
    run_check, CheckReport, DnsLookup, Event, State, SystemResolver, TargetSpec,
};

const DEFAULT_CONFIG_FILE: &str = "tls-checker.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Targets to check, as host[:port[:mode]] (mode: raw, smtp, imap, ldap)
    targets: Vec<String>,

    /// Output format: json, text, summary
    #[arg(short, long)]
    output: Option<String>,

    /// Exit code used when any check is critical
    #[arg(long)]
    exit_code: Option<i32>,

    /// Match end-entity TLSA records published in the DNS
    #[arg(long)]
    tlsa: bool,

    /// TCP connect timeout, in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Timeout for each read while negotiating, in seconds
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Push metrics to a Prometheus push gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus push gateway address
    #[arg(long)]
    prometheus_address: Option<String>,

    /// Configuration file (defaults to ./tls-checker.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };
    let output = match config.output_format() {
        Ok(output) => output,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    let specs: Vec<TargetSpec> = match config
        .targets
        .iter()
        .flatten()
        .map(|target| target.parse())
        .collect()
    {
        Ok(specs) => specs,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    let dns: Arc<dyn DnsLookup> = match SystemResolver::from_system_conf() {
        Ok(resolver) => Arc::new(resolver),
        Err(e) => {
            error!("Cannot read the system DNS configuration: {}", e);
            exit(1);
        }
    };

    let targets: Vec<_> = specs
        .iter()
        .flat_map(|spec| {
            let targets = spec.targets(dns.as_ref());
            if targets.is_empty() {
                error!("{}: no address found", spec.host);
            }
            targets
        })
        .collect();
    info!("Checking {} targets", targets.len());

    // One instant for the whole run, so results are comparable.
    let now = Utc::now();
    let options = config.check_options();
    let (sender, receiver): (Sender<CheckReport>, Receiver<CheckReport>) = mpsc::channel();
    for target in targets {
        let thread_tx = sender.clone();
        let dns = Arc::clone(&dns);
        let options = options.clone();
        thread::spawn(move || {
            let report = run_check(target, &options, dns.as_ref(), now);
            if thread_tx.send(report).is_err() {
                debug!("Result receiver is gone");
            }
        });
    }
    drop(sender);

    let mut reports: Vec<CheckReport> = receiver.iter().collect();
    reports.sort_by_key(|report| tls_checker::event::service(&report.target));

    let events: Vec<Event> = reports.iter().flat_map(CheckReport::events).collect();
    print_events(&events, output);

    if let Some(address) = config.prometheus_address() {
        metrics::prom::prometheus_metrics(&reports, address);
    }

    let failed = reports.is_empty()
        || reports
            .iter()
            .any(|report| report.result.state == State::Critical);
    exit(if failed { config.exit_code.unwrap_or(2) } else { 0 });
}

fn load_config(cli: &Cli) -> Result<Config, tls_checker::config::ConfigError> {
    let file_config = match &cli.config {
        Some(path) => Some(Config::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Some(Config::from_file(DEFAULT_CONFIG_FILE)?)
        }
        None => None,
    };

    let cli_config = Config::from_cli_args(
        (!cli.targets.is_empty()).then(|| cli.targets.clone()),
        cli.output.clone(),
        cli.exit_code,
        cli.tlsa.then_some(true),
        cli.connect_timeout,
        cli.read_timeout,
        cli.prometheus.then_some(true),
        cli.prometheus_address.clone(),
    );

    let mut config = Config::default();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    let config = config.merge_with(cli_config);
    config.validate()?;
    Ok(config)
}

fn print_events(events: &[Event], output: OutputFormat) {
    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(events) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Cannot serialize results: {}", e),
        },
        OutputFormat::Text => {
            for event in events {
                println!("{}", text_line(event));
            }
        }
        OutputFormat::Summary => println!("{}", summary_table(events)),
    }
}

fn text_line(event: &Event) -> String {
    format!(
        "{:<8} {} {}",
        event.state.to_string(),
        event.service,
        event.description
    )
}

fn summary_table(events: &[Event]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Service", "State", "Description", "Days left"]);
    for event in events {
        let days = event
            .metric
            .map(|seconds| (seconds / 86_400).to_string())
            .unwrap_or_default();
        table.add_row(vec![
            event.service.clone(),
            event.state.to_string(),
            event.description.clone(),
            days,
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tls_checker::evaluator::CheckResult;
    use tls_checker::{CheckTarget, FetchOutcome, Mode};

    fn event(state: State, metric: Option<i64>) -> Event {
        let target = CheckTarget::new(
            Some("example.com".to_owned()),
            "192.0.2.1".parse().unwrap(),
            443,
            Mode::Raw,
        );
        let result = CheckResult {
            state,
            description: "certificate will expire in 5 days".to_owned(),
            metric_seconds: metric,
        };
        let mut event = Event::for_certificate(&target, &result, &FetchOutcome::NoCertificate);
        event.metric = metric;
        event
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "tls-checker",
            "mx.example.com",
            "ldap.example.com:389:ldap",
            "--tlsa",
            "-o",
            "json",
            "--read-timeout",
            "3",
            "-vv",
        ]);
        assert_eq!(cli.targets.len(), 2);
        assert!(cli.tlsa);
        assert_eq!(cli.output.as_deref(), Some("json"));
        assert_eq!(cli.read_timeout, Some(3));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.prometheus);
    }

    #[test]
    fn test_text_line() {
        let line = text_line(&event(State::Warn, Some(5 * 86_400)));
        assert_eq!(
            line,
            "warn     X.509/example.com/192.0.2.1:443 certificate will expire in 5 days"
        );
    }

    #[test]
    fn test_summary_table() {
        let table = summary_table(&[event(State::Warn, Some(5 * 86_400 + 60))]).to_string();
        assert!(table.contains("X.509/example.com/192.0.2.1:443"));
        assert!(table.contains("warn"));
        assert!(table.contains('5'));
    }
}
