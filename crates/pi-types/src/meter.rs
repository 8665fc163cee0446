//! Logical meter model owned by the controller.

use crate::{DeviceId, MeterCellId, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Band type (what happens to traffic exceeding the band).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandType {
    /// Drop packets exceeding the band.
    Drop,
    /// Remark the DSCP of packets exceeding the band.
    Remark,
    /// Vendor-specific action.
    Experimenter,
    /// Mark packets exceeding the band yellow.
    MarkYellow,
    /// Mark packets exceeding the band red.
    MarkRed,
    /// Undifferentiated rate-limit band.
    None,
}

impl BandType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "DROP",
            Self::Remark => "REMARK",
            Self::Experimenter => "EXPERIMENTER",
            Self::MarkYellow => "MARK_YELLOW",
            Self::MarkRed => "MARK_RED",
            Self::None => "NONE",
        }
    }
}

impl FromStr for BandType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DROP" => Ok(Self::Drop),
            "REMARK" => Ok(Self::Remark),
            "EXPERIMENTER" => Ok(Self::Experimenter),
            "MARK_YELLOW" => Ok(Self::MarkYellow),
            "MARK_RED" => Ok(Self::MarkRed),
            "NONE" => Ok(Self::None),
            _ => Err(ParseError::InvalidBandType(s.to_string())),
        }
    }
}

impl fmt::Display for BandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a logical meter's rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterUnit {
    /// Kilobytes per second.
    KbPerSec,
    /// Packets per second.
    PktsPerSec,
    /// Bytes per second.
    BytesPerSec,
}

impl MeterUnit {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KbPerSec => "KB_PER_SEC",
            Self::PktsPerSec => "PKTS_PER_SEC",
            Self::BytesPerSec => "BYTES_PER_SEC",
        }
    }
}

impl FromStr for MeterUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "KB_PER_SEC" => Ok(Self::KbPerSec),
            "PKTS_PER_SEC" => Ok(Self::PktsPerSec),
            "BYTES_PER_SEC" => Ok(Self::BytesPerSec),
            _ => Err(ParseError::InvalidMeterUnit(s.to_string())),
        }
    }
}

impl fmt::Display for MeterUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a logical meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterState {
    #[default]
    PendingAdd,
    Added,
    PendingRemove,
    Removed,
}

/// One band of a logical meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Band {
    /// Band type.
    #[serde(rename = "type", default = "default_band_type")]
    pub band_type: BandType,
    /// Rate threshold.
    pub rate: u64,
    /// Burst size, if the band defines one.
    #[serde(default)]
    pub burst_size: Option<u64>,
}

fn default_band_type() -> BandType {
    BandType::None
}

impl Band {
    /// Creates an uncolored band with a burst size.
    pub fn new(rate: u64, burst_size: u64) -> Self {
        Self {
            band_type: BandType::None,
            rate,
            burst_size: Some(burst_size),
        }
    }

    /// Returns this band with a different type.
    pub fn with_type(mut self, band_type: BandType) -> Self {
        self.band_type = band_type;
        self
    }
}

/// A rate-limiting policy targeted at one meter cell of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    /// Device the meter is installed on.
    pub device_id: DeviceId,
    /// Cell the meter occupies.
    pub cell_id: MeterCellId,
    /// Rate bands.
    pub bands: Vec<Band>,
    /// Rate unit; `None` when unknown (e.g. meters rebuilt from device state).
    #[serde(default)]
    pub unit: Option<MeterUnit>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: MeterState,
}

impl Meter {
    /// Creates a pending meter with the given bands and no unit.
    pub fn new(device_id: DeviceId, cell_id: MeterCellId, bands: Vec<Band>) -> Self {
        Self {
            device_id,
            cell_id,
            bands,
            unit: None,
            state: MeterState::PendingAdd,
        }
    }

    /// Returns this meter with a unit.
    pub fn with_unit(mut self, unit: MeterUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Returns this meter with a lifecycle state.
    pub fn with_state(mut self, state: MeterState) -> Self {
        self.state = state;
        self
    }
}

/// Scope of a set of meter features; for pipeline meters, the meter array name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeterScope(String);

impl MeterScope {
    /// Creates a scope from a name.
    pub fn of(name: impl Into<String>) -> Self {
        MeterScope(name.into())
    }

    /// Returns the scope name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities of one meter array on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterFeatures {
    pub device_id: DeviceId,
    pub scope: MeterScope,
    pub max_bands: u8,
    pub max_colors: u8,
    pub start_index: u64,
    pub end_index: u64,
    pub band_types: BTreeSet<BandType>,
    /// Supported units; empty when the pipeline unit is unusable.
    pub units: BTreeSet<MeterUnit>,
    pub has_burst: bool,
    pub has_stats: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PiMeterId;

    #[test]
    fn test_band_type_parse() {
        assert_eq!("none".parse::<BandType>().unwrap(), BandType::None);
        assert_eq!("MARK_RED".parse::<BandType>().unwrap(), BandType::MarkRed);
        assert!("purple".parse::<BandType>().is_err());
    }

    #[test]
    fn test_meter_unit_round_trip_str() {
        for unit in [MeterUnit::KbPerSec, MeterUnit::PktsPerSec, MeterUnit::BytesPerSec] {
            assert_eq!(unit.as_str().parse::<MeterUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_meter_deserialize_defaults() {
        let json = r#"{
            "device_id": "device:s1",
            "cell_id": {"meter_id": "ingress.meter", "index": 5},
            "bands": [{"rate": 100, "burst_size": 10}, {"rate": 1000, "burst_size": 50}]
        }"#;
        let meter: Meter = serde_json::from_str(json).unwrap();

        assert_eq!(meter.device_id, DeviceId::new("device:s1").unwrap());
        assert_eq!(
            meter.cell_id,
            MeterCellId::new(PiMeterId::new("ingress.meter").unwrap(), 5)
        );
        assert_eq!(meter.bands, vec![Band::new(100, 10), Band::new(1000, 50)]);
        assert_eq!(meter.unit, None);
        assert_eq!(meter.state, MeterState::PendingAdd);
    }
}
