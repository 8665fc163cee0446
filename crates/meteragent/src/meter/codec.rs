//! Codec between meter cell configs and P4Runtime meter entries.

use pi_types::{MeterBand, MeterCellConfig, MeterCellId, PipelineModel};
use thiserror::Error;

use super::wire::{Index, MeterConfig, MeterEntry};

/// Codec error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("number of meter bands should be 2 (modify) or 0 (reset), found {0}")]
    InvalidBandCount(usize),

    #[error("meter {0} not found in pipeline")]
    UnknownMeter(String),

    #[error("meter id {0} not found in pipeline")]
    UnknownMeterP4Id(u32),

    #[error("meter entry for meter id {0} has no index")]
    MissingIndex(u32),

    #[error("{field} value {value} out of range")]
    ValueOutOfRange { field: &'static str, value: i128 },
}

/// Builds the wire config for a band list.
///
/// Returns `None` for an empty list: a reset is encoded by leaving the config
/// unset. Two bands are split into committed and peak with
/// [`MeterBand::order`].
pub fn bands_to_p4_config(bands: &[MeterBand]) -> Result<Option<MeterConfig>, CodecError> {
    let (committed, peak) = match bands {
        [] => return Ok(None),
        [first, second] => MeterBand::order(*first, *second),
        _ => return Err(CodecError::InvalidBandCount(bands.len())),
    };

    Ok(Some(MeterConfig {
        cir: to_wire("cir", committed.rate)?,
        cburst: to_wire("cburst", committed.burst)?,
        pir: to_wire("pir", peak.rate)?,
        pburst: to_wire("pburst", peak.burst)?,
    }))
}

/// Rebuilds a cell config from an optional wire config.
///
/// An absent config is the default state; zero-valued fields in a present
/// config are real bands.
pub fn cell_config_from_p4(
    cell_id: MeterCellId,
    p4_config: Option<&MeterConfig>,
) -> Result<MeterCellConfig, CodecError> {
    let Some(p4_config) = p4_config else {
        return Ok(MeterCellConfig::reset(cell_id));
    };

    let committed = MeterBand::new(
        from_wire("cir", p4_config.cir)?,
        from_wire("cburst", p4_config.cburst)?,
    );
    let peak = MeterBand::new(
        from_wire("pir", p4_config.pir)?,
        from_wire("pburst", p4_config.pburst)?,
    );
    Ok(MeterCellConfig::modify(cell_id, committed, peak))
}

fn to_wire(field: &'static str, value: u64) -> Result<i64, CodecError> {
    i64::try_from(value).map_err(|_| CodecError::ValueOutOfRange {
        field,
        value: i128::from(value),
    })
}

fn from_wire(field: &'static str, value: i64) -> Result<u64, CodecError> {
    u64::try_from(value).map_err(|_| CodecError::ValueOutOfRange {
        field,
        value: i128::from(value),
    })
}

/// Encodes and decodes meter entries for one device pipeline.
///
/// The pipeline resolves meter names to the numeric ids used on the wire.
#[derive(Debug, Clone, Copy)]
pub struct MeterEntryCodec<'a> {
    pipeline: &'a PipelineModel,
}

impl<'a> MeterEntryCodec<'a> {
    /// Creates a codec for a pipeline.
    pub fn new(pipeline: &'a PipelineModel) -> Self {
        Self { pipeline }
    }

    /// Encodes a cell config. The config field is left unset for a reset.
    pub fn encode(&self, config: &MeterCellConfig) -> Result<MeterEntry, CodecError> {
        let mut entry = self.encode_key(config.cell_id())?;
        entry.config = bands_to_p4_config(&config.bands())?;
        Ok(entry)
    }

    /// Encodes only the key (meter id and index) of a cell.
    pub fn encode_key(&self, cell_id: &MeterCellId) -> Result<MeterEntry, CodecError> {
        let model = self
            .pipeline
            .meter(cell_id.meter_id())
            .ok_or_else(|| CodecError::UnknownMeter(cell_id.meter_id().to_string()))?;
        let index = i64::try_from(cell_id.index()).map_err(|_| CodecError::ValueOutOfRange {
            field: "index",
            value: i128::from(cell_id.index()),
        })?;

        Ok(MeterEntry {
            meter_id: model.p4_id,
            index: Some(Index { index }),
            config: None,
        })
    }

    /// Decodes a meter entry read from the device.
    pub fn decode(&self, entry: &MeterEntry) -> Result<MeterCellConfig, CodecError> {
        let cell_id = self.decode_key(entry)?;
        cell_config_from_p4(cell_id, entry.config.as_ref())
    }

    /// Decodes only the cell a meter entry addresses, ignoring its config.
    pub fn decode_key(&self, entry: &MeterEntry) -> Result<MeterCellId, CodecError> {
        let model = self
            .pipeline
            .meter_by_p4_id(entry.meter_id)
            .ok_or(CodecError::UnknownMeterP4Id(entry.meter_id))?;
        let index = entry
            .index
            .ok_or(CodecError::MissingIndex(entry.meter_id))?
            .index;
        let index = from_wire("index", index)?;

        Ok(MeterCellId::new(model.id.clone(), index))
    }
}
