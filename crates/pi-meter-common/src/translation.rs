//! Translation of logical meters into meter cell configs.
//!
//! The translation store is the controller's record of intent: for each
//! handle it holds the logical meter and the cell config it was translated
//! to. A missing entry means no intent was recorded for that cell.

use dashmap::DashMap;
use pi_types::{
    BandType, Meter, MeterBand, MeterCellConfig, MeterCellHandle, MeterUnit, PiMeterId,
    PipelineModel,
};
use thiserror::Error;
use tracing::debug;

/// Reasons a logical meter cannot be represented as a cell config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("meter {0} is not defined in the pipeline")]
    UnknownMeter(PiMeterId),

    #[error("index {index} out of range for meter {meter_id} (size {size})")]
    IndexOutOfRange {
        meter_id: PiMeterId,
        index: u64,
        size: u64,
    },

    #[error("meter must have exactly 2 bands, found {0}")]
    InvalidBandCount(usize),

    #[error("band {0} has no burst size")]
    MissingBurst(usize),

    #[error("band type {0} is not supported")]
    UnsupportedBandType(BandType),

    #[error("unit {found} not supported by meter {meter_id}")]
    UnsupportedUnit { meter_id: PiMeterId, found: MeterUnit },

    #[error("band {band} {field} {value} exceeds the wire range")]
    ValueOutOfRange {
        band: usize,
        field: &'static str,
        value: u64,
    },
}

/// Largest rate or burst a device meter config can carry.
pub const MAX_BAND_VALUE: u64 = i64::MAX as u64;

/// Record asserting that a logical meter corresponds to a cell config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedEntity {
    original: Meter,
    translated: MeterCellConfig,
    handle: MeterCellHandle,
}

impl TranslatedEntity {
    /// Creates a translated entity.
    pub fn new(original: Meter, translated: MeterCellConfig, handle: MeterCellHandle) -> Self {
        Self {
            original,
            translated,
            handle,
        }
    }

    /// Returns the logical meter.
    pub fn original(&self) -> &Meter {
        &self.original
    }

    /// Returns the cell config the meter was translated to.
    pub fn translated(&self) -> &MeterCellConfig {
        &self.translated
    }

    /// Returns the handle the entity is stored under.
    pub fn handle(&self) -> &MeterCellHandle {
        &self.handle
    }
}

/// Maps logical meters to cell configs and records intent per handle.
pub trait TranslationStore: Send + Sync {
    /// Translates a logical meter for the given pipeline.
    fn translate(
        &self,
        meter: &Meter,
        pipeline: &PipelineModel,
    ) -> Result<MeterCellConfig, TranslationError>;

    /// Records intent for a handle, replacing any previous entry.
    fn learn(&self, handle: MeterCellHandle, entity: TranslatedEntity);

    /// Drops the intent recorded for a handle.
    fn forget(&self, handle: &MeterCellHandle);

    /// Returns the intent recorded for a handle.
    fn lookup(&self, handle: &MeterCellHandle) -> Option<TranslatedEntity>;
}

/// In-process [`TranslationStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MeterTranslator {
    entities: DashMap<MeterCellHandle, TranslatedEntity>,
}

impl MeterTranslator {
    /// Creates an empty translator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of learned entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity has been learned.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl TranslationStore for MeterTranslator {
    fn translate(
        &self,
        meter: &Meter,
        pipeline: &PipelineModel,
    ) -> Result<MeterCellConfig, TranslationError> {
        let meter_id = meter.cell_id.meter_id();
        let model = pipeline
            .meter(meter_id)
            .ok_or_else(|| TranslationError::UnknownMeter(meter_id.clone()))?;

        if meter.cell_id.index() >= model.size {
            return Err(TranslationError::IndexOutOfRange {
                meter_id: meter_id.clone(),
                index: meter.cell_id.index(),
                size: model.size,
            });
        }

        if let Some(unit) = meter.unit {
            if model.unit.meter_unit() != Some(unit) {
                return Err(TranslationError::UnsupportedUnit {
                    meter_id: meter_id.clone(),
                    found: unit,
                });
            }
        }

        if meter.bands.len() != 2 {
            return Err(TranslationError::InvalidBandCount(meter.bands.len()));
        }

        let mut bands = Vec::with_capacity(2);
        for (i, band) in meter.bands.iter().enumerate() {
            if band.band_type != BandType::None {
                return Err(TranslationError::UnsupportedBandType(band.band_type));
            }
            let burst = band.burst_size.ok_or(TranslationError::MissingBurst(i))?;
            for (field, value) in [("rate", band.rate), ("burst", burst)] {
                if value > MAX_BAND_VALUE {
                    return Err(TranslationError::ValueOutOfRange { band: i, field, value });
                }
            }
            bands.push(MeterBand::new(band.rate, burst));
        }

        Ok(MeterCellConfig::modify(meter.cell_id.clone(), bands[0], bands[1]))
    }

    fn learn(&self, handle: MeterCellHandle, entity: TranslatedEntity) {
        debug!(handle = %handle, "learn translated meter");
        self.entities.insert(handle, entity);
    }

    fn forget(&self, handle: &MeterCellHandle) {
        if self.entities.remove(handle).is_some() {
            debug!(handle = %handle, "forget translated meter");
        }
    }

    fn lookup(&self, handle: &MeterCellHandle) -> Option<TranslatedEntity> {
        self.entities.get(handle).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_types::{Band, DeviceId, MeterCellId, PiMeterModel, PiMeterUnit};
    use pretty_assertions::assert_eq;

    fn pipeline() -> PipelineModel {
        PipelineModel::new(vec![PiMeterModel {
            id: PiMeterId::new("ingress.meter").unwrap(),
            p4_id: 5,
            size: 4,
            unit: PiMeterUnit::Bytes,
        }])
        .unwrap()
    }

    fn meter(index: u64, bands: Vec<Band>) -> Meter {
        Meter::new(
            DeviceId::new("device:s1").unwrap(),
            MeterCellId::new(PiMeterId::new("ingress.meter").unwrap(), index),
            bands,
        )
    }

    #[test]
    fn test_translate_two_bands() {
        let translator = MeterTranslator::new();
        let config = translator
            .translate(&meter(0, vec![Band::new(1000, 50), Band::new(100, 10)]), &pipeline())
            .unwrap();

        assert_eq!(config.committed(), Some(MeterBand::new(100, 10)));
        assert_eq!(config.peak(), Some(MeterBand::new(1000, 50)));
    }

    #[test]
    fn test_translate_rejects_bad_band_count() {
        let translator = MeterTranslator::new();
        assert_eq!(
            translator.translate(&meter(0, vec![Band::new(1, 1)]), &pipeline()),
            Err(TranslationError::InvalidBandCount(1))
        );
        assert_eq!(
            translator.translate(&meter(0, vec![]), &pipeline()),
            Err(TranslationError::InvalidBandCount(0))
        );
    }

    #[test]
    fn test_translate_rejects_unsupported_band() {
        let translator = MeterTranslator::new();
        let bands = vec![Band::new(1, 1).with_type(BandType::Drop), Band::new(2, 2)];
        assert_eq!(
            translator.translate(&meter(0, bands), &pipeline()),
            Err(TranslationError::UnsupportedBandType(BandType::Drop))
        );

        let mut missing = Band::new(2, 2);
        missing.burst_size = None;
        assert_eq!(
            translator.translate(&meter(0, vec![Band::new(1, 1), missing]), &pipeline()),
            Err(TranslationError::MissingBurst(1))
        );
    }

    #[test]
    fn test_translate_rejects_values_beyond_wire_range() {
        let translator = MeterTranslator::new();
        assert_eq!(
            translator.translate(
                &meter(0, vec![Band::new(u64::MAX, 10), Band::new(u64::MAX, 50)]),
                &pipeline()
            ),
            Err(TranslationError::ValueOutOfRange {
                band: 0,
                field: "rate",
                value: u64::MAX,
            })
        );
        assert_eq!(
            translator.translate(
                &meter(0, vec![Band::new(1, 1), Band::new(2, MAX_BAND_VALUE + 1)]),
                &pipeline()
            ),
            Err(TranslationError::ValueOutOfRange {
                band: 1,
                field: "burst",
                value: MAX_BAND_VALUE + 1,
            })
        );

        let edge = vec![Band::new(MAX_BAND_VALUE, MAX_BAND_VALUE), Band::new(1, 1)];
        assert!(translator.translate(&meter(0, edge), &pipeline()).is_ok());
    }

    #[test]
    fn test_translate_checks_pipeline() {
        let translator = MeterTranslator::new();
        let bands = vec![Band::new(1, 1), Band::new(2, 2)];

        assert!(matches!(
            translator.translate(&meter(4, bands.clone()), &pipeline()),
            Err(TranslationError::IndexOutOfRange { index: 4, size: 4, .. })
        ));

        let unknown = Meter::new(
            DeviceId::new("device:s1").unwrap(),
            MeterCellId::new(PiMeterId::new("egress.meter").unwrap(), 0),
            bands.clone(),
        );
        assert!(matches!(
            translator.translate(&unknown, &pipeline()),
            Err(TranslationError::UnknownMeter(_))
        ));

        let packets = meter(0, bands.clone()).with_unit(MeterUnit::PktsPerSec);
        assert!(matches!(
            translator.translate(&packets, &pipeline()),
            Err(TranslationError::UnsupportedUnit { found: MeterUnit::PktsPerSec, .. })
        ));

        let bytes = meter(0, bands).with_unit(MeterUnit::KbPerSec);
        assert!(translator.translate(&bytes, &pipeline()).is_ok());
    }

    #[test]
    fn test_learn_lookup_forget() {
        let translator = MeterTranslator::new();
        let m = meter(1, vec![Band::new(1, 1), Band::new(2, 2)]);
        let config = translator.translate(&m, &pipeline()).unwrap();
        let handle = MeterCellHandle::new(m.device_id.clone(), m.cell_id.clone());

        assert!(translator.lookup(&handle).is_none());

        translator.learn(handle.clone(), TranslatedEntity::new(m.clone(), config.clone(), handle.clone()));
        let entity = translator.lookup(&handle).unwrap();
        assert_eq!(entity.translated(), &config);
        assert_eq!(entity.original(), &m);
        assert_eq!(translator.len(), 1);

        translator.forget(&handle);
        assert!(translator.lookup(&handle).is_none());
        assert!(translator.is_empty());

        // Forgetting an unknown handle is a no-op.
        translator.forget(&handle);
    }
}
