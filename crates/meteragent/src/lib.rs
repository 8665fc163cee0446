//! Meter Agent - P4Runtime meter cell synchronization
//!
//! This crate keeps the meter cells of P4Runtime devices consistent with the
//! controller's logical meters. It translates meter operations into device
//! meter-cell writes, mirrors what each device has accepted, and repairs
//! cells that drift away from what the controller installed.
//!
//! # Architecture
//!
//! ```text
//! [YAML config] ──> [MeterDaemon] ──> [MeterOrch] ──> [P4RuntimeClient] ──> [device]
//!                        │                 │
//!                        │                 ├── TranslationStore
//!                        │                 └── MeterMirror
//!                        └── periodic reconcile
//! ```
//!
//! # Key Components
//!
//! - [`daemon::MeterDaemon`]: Startup operations and the reconciliation loop
//! - [`meter::MeterOrch`]: Write coordination and reconciliation reads
//! - [`meter::MeterEntryCodec`]: Band codec between cell configs and wire entries
//! - [`meter::MeterFeaturesBuilder`]: Per-meter capability descriptors

pub mod config;
pub mod daemon;
pub mod logging;
pub mod meter;

pub use config::{AgentConfig, ConfigError};
pub use daemon::{MeterDaemon, MeterDaemonConfig};
pub use logging::{init_logging, init_logging_pretty, try_init_logging, LogFormat};
