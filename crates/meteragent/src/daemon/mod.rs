//! Meter daemon: startup operations and periodic reconciliation.

mod meterdaemon;

pub use meterdaemon::{MeterDaemon, MeterDaemonConfig};
