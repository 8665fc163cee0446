//! Meter features derived from pipeline metadata.

use std::collections::BTreeSet;

use pi_types::{BandType, DeviceId, MeterFeatures, MeterScope, PiMeterModel};

const PI_METER_START_INDEX: u64 = 0;
const PI_METER_MAX_BANDS: u8 = 2;
const PI_METER_MAX_COLORS: u8 = 3;

/// Builds the [`MeterFeatures`] of one pipeline meter array.
#[derive(Debug, Clone, Copy)]
pub struct MeterFeaturesBuilder<'a> {
    model: &'a PiMeterModel,
    device_id: &'a DeviceId,
}

impl<'a> MeterFeaturesBuilder<'a> {
    pub fn new(model: &'a PiMeterModel, device_id: &'a DeviceId) -> Self {
        Self { model, device_id }
    }

    /// Builds the features. The scope is the meter array name; only the
    /// uncolored band type is supported, bursts are supported and statistics
    /// are not.
    pub fn build(&self) -> MeterFeatures {
        MeterFeatures {
            device_id: self.device_id.clone(),
            scope: MeterScope::of(self.model.id.as_str()),
            max_bands: PI_METER_MAX_BANDS,
            max_colors: PI_METER_MAX_COLORS,
            start_index: PI_METER_START_INDEX,
            end_index: self.model.size.saturating_sub(1),
            band_types: BTreeSet::from([BandType::None]),
            units: self.model.unit.meter_unit().into_iter().collect(),
            has_burst: true,
            has_stats: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_types::{MeterUnit, PiMeterId, PiMeterUnit};
    use pretty_assertions::assert_eq;

    fn model(unit: PiMeterUnit) -> PiMeterModel {
        PiMeterModel {
            id: PiMeterId::new("ingress.meter").unwrap(),
            p4_id: 5,
            size: 1024,
            unit,
        }
    }

    #[test]
    fn test_build_bytes_meter() {
        let device = DeviceId::new("device:s1").unwrap();
        let model = model(PiMeterUnit::Bytes);
        let features = MeterFeaturesBuilder::new(&model, &device).build();

        assert_eq!(
            features,
            MeterFeatures {
                device_id: device.clone(),
                scope: MeterScope::of("ingress.meter"),
                max_bands: 2,
                max_colors: 3,
                start_index: 0,
                end_index: 1023,
                band_types: BTreeSet::from([BandType::None]),
                units: BTreeSet::from([MeterUnit::KbPerSec]),
                has_burst: true,
                has_stats: false,
            }
        );
    }

    #[test]
    fn test_units_by_native_unit() {
        let device = DeviceId::new("device:s1").unwrap();

        let packets = model(PiMeterUnit::Packets);
        assert_eq!(
            MeterFeaturesBuilder::new(&packets, &device).build().units,
            BTreeSet::from([MeterUnit::PktsPerSec])
        );

        let unspecified = model(PiMeterUnit::Unspecified);
        assert!(MeterFeaturesBuilder::new(&unspecified, &device)
            .build()
            .units
            .is_empty());
    }
}
