//! MeterOrch - meter cell synchronization for P4Runtime devices.
//!
//! This module keeps the meter cells of programmable devices in line with
//! the controller's logical meters. Each device exposes fixed meter arrays;
//! every cell is either in its default state or holds a committed and a peak
//! band.
//!
//! # Architecture
//!
//! ```text
//! MeterOperation ──> MeterOrch ──> TranslationStore (learn / forget)
//!                       │
//!                       ├──> MeterMirror (skip no-op writes)
//!                       ├──> MeterEntryCodec ──> P4RuntimeClient
//!                       └──> MeterMirror (record accepted writes)
//!
//! get_meters ──> bulk read ──> MeterMirror::sync
//!                       │
//!                       └──> compare with TranslationStore
//!                              ├── match        ──> returned as Meter
//!                              └── divergence   ──> reset to default
//! ```
//!
//! # Write Serialization
//!
//! At most one write transaction is in flight per device. Writes take a
//! per-device stripe of a fixed lock pool for the whole
//! translate/encode/submit/mirror sequence. Reads are not serialized against
//! writes; any apparent divergence they observe is repaired on a later read.
//!
//! # Failure Handling
//!
//! - Translation failures abort before any device I/O
//! - Device failures leave the mirror stale until the next read
//! - Failed resets during reconciliation are logged, never retried

mod client;
mod codec;
mod features;
mod orch;
mod sim;
mod wire;

pub use client::{
    read_meter_cells_sync, submit_sync, ClientError, MeterCellReadout, P4RuntimeClient,
};
pub use codec::{bands_to_p4_config, cell_config_from_p4, CodecError, MeterEntryCodec};
pub use features::MeterFeaturesBuilder;
pub use orch::{
    MeterOperation, MeterOperationType, MeterOrch, MeterOrchConfig, MeterOrchError,
    MeterOrchStats, PipelineProvider, ReconcileReport, StaticPipelines, DEFAULT_LOCK_STRIPES,
};
pub use sim::SimulatedDevice;
pub use wire::{Index, MeterConfig, MeterEntry};
