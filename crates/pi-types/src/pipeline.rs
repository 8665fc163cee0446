//! Static pipeline metadata describing the meter arrays of a device.

use crate::{MeterUnit, ParseError, PiMeterId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Native unit a pipeline meter counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiMeterUnit {
    #[default]
    Unspecified,
    Bytes,
    Packets,
}

impl PiMeterUnit {
    /// Returns the logical rate unit matching this native unit.
    ///
    /// Byte meters are driven in kilobytes per second, packet meters in
    /// packets per second. An unspecified unit has no usable counterpart.
    pub fn meter_unit(&self) -> Option<MeterUnit> {
        match self {
            Self::Bytes => Some(MeterUnit::KbPerSec),
            Self::Packets => Some(MeterUnit::PktsPerSec),
            Self::Unspecified => None,
        }
    }
}

/// Description of one meter array in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiMeterModel {
    /// Meter array name.
    pub id: PiMeterId,
    /// Numeric id used on the wire.
    pub p4_id: u32,
    /// Number of cells.
    pub size: u64,
    /// Native unit.
    #[serde(default)]
    pub unit: PiMeterUnit,
}

/// Meter metadata of a device pipeline, static for the device's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineModel {
    meters: Vec<PiMeterModel>,
}

impl PipelineModel {
    /// Creates a pipeline model.
    ///
    /// # Errors
    ///
    /// Returns an error if a meter name or numeric id is repeated, or a
    /// meter has no cells.
    pub fn new(meters: Vec<PiMeterModel>) -> Result<Self, ParseError> {
        let mut names = HashSet::new();
        let mut p4_ids = HashSet::new();
        for meter in &meters {
            if meter.size == 0 {
                return Err(ParseError::ZeroSizeMeter(meter.id.to_string()));
            }
            if !names.insert(&meter.id) {
                return Err(ParseError::DuplicateMeter(meter.id.to_string()));
            }
            if !p4_ids.insert(meter.p4_id) {
                return Err(ParseError::DuplicateMeterP4Id(meter.p4_id));
            }
        }
        Ok(Self { meters })
    }

    /// Returns all meter arrays.
    pub fn meters(&self) -> &[PiMeterModel] {
        &self.meters
    }

    /// Looks up a meter array by name.
    pub fn meter(&self, id: &PiMeterId) -> Option<&PiMeterModel> {
        self.meters.iter().find(|m| &m.id == id)
    }

    /// Looks up a meter array by its numeric wire id.
    pub fn meter_by_p4_id(&self, p4_id: u32) -> Option<&PiMeterModel> {
        self.meters.iter().find(|m| m.p4_id == p4_id)
    }
}

impl<'de> Deserialize<'de> for PipelineModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            meters: Vec<PiMeterModel>,
        }

        let raw = Raw::deserialize(deserializer)?;
        PipelineModel::new(raw.meters).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, p4_id: u32, size: u64) -> PiMeterModel {
        PiMeterModel {
            id: PiMeterId::new(name).unwrap(),
            p4_id,
            size,
            unit: PiMeterUnit::Bytes,
        }
    }

    #[test]
    fn test_lookup() {
        let pipeline = PipelineModel::new(vec![model("a", 1, 8), model("b", 2, 16)]).unwrap();

        assert_eq!(pipeline.meters().len(), 2);
        assert_eq!(pipeline.meter(&PiMeterId::new("b").unwrap()).unwrap().p4_id, 2);
        assert_eq!(pipeline.meter_by_p4_id(1).unwrap().size, 8);
        assert!(pipeline.meter_by_p4_id(3).is_none());
    }

    #[test]
    fn test_meter_unit_mapping() {
        assert_eq!(PiMeterUnit::Bytes.meter_unit(), Some(MeterUnit::KbPerSec));
        assert_eq!(PiMeterUnit::Packets.meter_unit(), Some(MeterUnit::PktsPerSec));
        assert_eq!(PiMeterUnit::Unspecified.meter_unit(), None);
    }

    #[test]
    fn test_rejects_duplicates_and_empty_meters() {
        assert_eq!(
            PipelineModel::new(vec![model("a", 1, 8), model("a", 2, 8)]),
            Err(ParseError::DuplicateMeter("a".to_string()))
        );
        assert_eq!(
            PipelineModel::new(vec![model("a", 1, 8), model("b", 1, 8)]),
            Err(ParseError::DuplicateMeterP4Id(1))
        );
        assert_eq!(
            PipelineModel::new(vec![model("a", 1, 0)]),
            Err(ParseError::ZeroSizeMeter("a".to_string()))
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: PipelineModel = serde_json::from_str(
            r#"{"meters": [{"id": "ingress.meter", "p4_id": 10, "size": 4, "unit": "PACKETS"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.meters()[0].unit, PiMeterUnit::Packets);

        let bad: Result<PipelineModel, _> = serde_json::from_str(
            r#"{"meters": [{"id": "m", "p4_id": 10, "size": 0}]}"#,
        );
        assert!(bad.is_err());
    }
}
