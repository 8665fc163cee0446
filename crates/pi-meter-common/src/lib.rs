//! Shared abstractions for programming meter cells on P4Runtime devices.
//!
//! This crate provides the collaborators consumed by the meter write
//! coordinator:
//!
//! - [`TranslationStore`]: maps logical meters to device cell configs and
//!   remembers the controller's intent per [`MeterCellHandle`]
//! - [`MeterMirror`]: caches the last config observed on or applied to a device
//! - [`WriteRequest`] / [`WriteResponse`]: a batch of cell updates and its
//!   per-entity outcome, as fed to the mirror
//! - [`StripedLock`]: fixed-size lock pool keyed by device identity
//!
//! In-memory implementations ([`MeterTranslator`], [`InMemoryMeterMirror`])
//! are provided for single-process deployments and tests.
//!
//! [`MeterCellHandle`]: pi_types::MeterCellHandle

mod mirror;
mod striped;
mod translation;
mod write;

pub use mirror::{InMemoryMeterMirror, MeterMirror, TimedEntry};
pub use striped::StripedLock;
pub use translation::{
    MeterTranslator, TranslatedEntity, TranslationError, TranslationStore, MAX_BAND_VALUE,
};
pub use write::{WriteEntityResponse, WriteRequest, WriteResponse};
