//! Protocol-independent types for meter-cell programming.
//!
//! This crate provides type-safe representations of the values exchanged
//! between the controller's logical meter model and a programmable
//! forwarding device:
//!
//! - [`DeviceId`], [`PiMeterId`], [`MeterCellId`], [`MeterCellHandle`]: identifiers
//! - [`MeterBand`], [`MeterCellConfig`]: device-side cell configuration
//! - [`Meter`], [`Band`], [`MeterFeatures`]: the controller's logical model
//! - [`PipelineModel`], [`PiMeterModel`]: static pipeline metadata

mod cell;
mod id;
mod meter;
mod pipeline;

pub use cell::{CellBands, MeterBand, MeterCellConfig};
pub use id::{DeviceId, MeterCellHandle, MeterCellId, PiMeterId};
pub use meter::{Band, BandType, Meter, MeterFeatures, MeterScope, MeterState, MeterUnit};
pub use pipeline::{PiMeterModel, PiMeterUnit, PipelineModel};

/// Common error type for parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("device id must not be empty")]
    EmptyDeviceId,

    #[error("meter id must not be empty")]
    EmptyMeterId,

    #[error("invalid band count: {0} (must be 0 or 2)")]
    InvalidBandCount(usize),

    #[error("invalid band type: {0}")]
    InvalidBandType(String),

    #[error("invalid meter unit: {0}")]
    InvalidMeterUnit(String),

    #[error("duplicate meter in pipeline: {0}")]
    DuplicateMeter(String),

    #[error("duplicate meter numeric id in pipeline: {0}")]
    DuplicateMeterP4Id(u32),

    #[error("meter {0} has size 0")]
    ZeroSizeMeter(String),
}
