//! Prometheus export of check reports.
//!
//! Each report becomes three gauges labelled by service, host, address,
//! port and mode: seconds left before the certificate expires, the check
//! state (0 ok, 1 warn, 2 critical) and the number of matching TLSA records.
//! They are sent to a push gateway once per run.

pub mod prom;
