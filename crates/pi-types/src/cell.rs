//! Device-side meter cell configuration.
//!
//! A cell is either in its default (reset) state with no bands, or holds
//! exactly two bands: a committed band and a peak band. The two-band case is
//! normalized on construction so that two configs built from the same pair of
//! bands compare equal regardless of the order the bands were given in.

use crate::{MeterCellId, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(rate, burst)` threshold of a rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterBand {
    /// Rate in the meter's native unit.
    pub rate: u64,
    /// Burst size in the meter's native unit.
    pub burst: u64,
}

impl MeterBand {
    /// Creates a new band.
    pub const fn new(rate: u64, burst: u64) -> Self {
        Self { rate, burst }
    }

    /// Splits two bands into `(committed, peak)`.
    ///
    /// The band with the lower rate is committed. On a rate tie the band
    /// with the smaller burst is committed and the larger burst is peak.
    ///
    /// # Examples
    ///
    /// ```
    /// use pi_types::MeterBand;
    ///
    /// let (committed, peak) = MeterBand::order(MeterBand::new(1000, 50), MeterBand::new(100, 10));
    /// assert_eq!(committed, MeterBand::new(100, 10));
    /// assert_eq!(peak, MeterBand::new(1000, 50));
    ///
    /// let (committed, peak) = MeterBand::order(MeterBand::new(500, 20), MeterBand::new(500, 5));
    /// assert_eq!(committed, MeterBand::new(500, 5));
    /// assert_eq!(peak, MeterBand::new(500, 20));
    /// ```
    pub fn order(first: MeterBand, second: MeterBand) -> (MeterBand, MeterBand) {
        if first.rate > second.rate || (first.rate == second.rate && first.burst >= second.burst) {
            (second, first)
        } else {
            (first, second)
        }
    }
}

impl fmt::Display for MeterBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate={} burst={}", self.rate, self.burst)
    }
}

/// Bands held by a meter cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellBands {
    /// Default state, no bands installed.
    Reset,
    /// Two-rate configuration.
    Modify { committed: MeterBand, peak: MeterBand },
}

/// Configuration of one meter cell as seen on (or written to) a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterCellConfig {
    cell_id: MeterCellId,
    bands: CellBands,
}

impl MeterCellConfig {
    /// Creates the default (reset) configuration for a cell.
    pub fn reset(cell_id: MeterCellId) -> Self {
        Self {
            cell_id,
            bands: CellBands::Reset,
        }
    }

    /// Creates a two-band configuration, ordering the bands into committed
    /// and peak with [`MeterBand::order`].
    pub fn modify(cell_id: MeterCellId, first: MeterBand, second: MeterBand) -> Self {
        let (committed, peak) = MeterBand::order(first, second);
        Self {
            cell_id,
            bands: CellBands::Modify { committed, peak },
        }
    }

    /// Builds a configuration from an arbitrary band list.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidBandCount`] unless the list holds
    /// exactly 0 or 2 bands.
    pub fn from_bands(cell_id: MeterCellId, bands: &[MeterBand]) -> Result<Self, ParseError> {
        match bands {
            [] => Ok(Self::reset(cell_id)),
            [first, second] => Ok(Self::modify(cell_id, *first, *second)),
            _ => Err(ParseError::InvalidBandCount(bands.len())),
        }
    }

    /// Returns the cell this configuration applies to.
    pub fn cell_id(&self) -> &MeterCellId {
        &self.cell_id
    }

    /// Returns the band state of the cell.
    pub fn cell_bands(&self) -> &CellBands {
        &self.bands
    }

    /// Returns true if this is the default configuration (no bands).
    pub fn is_default_config(&self) -> bool {
        matches!(self.bands, CellBands::Reset)
    }

    /// Returns true if this is a two-band configuration.
    pub fn is_modify_config(&self) -> bool {
        matches!(self.bands, CellBands::Modify { .. })
    }

    /// Returns the committed band, if any.
    pub fn committed(&self) -> Option<MeterBand> {
        match self.bands {
            CellBands::Modify { committed, .. } => Some(committed),
            CellBands::Reset => None,
        }
    }

    /// Returns the peak band, if any.
    pub fn peak(&self) -> Option<MeterBand> {
        match self.bands {
            CellBands::Modify { peak, .. } => Some(peak),
            CellBands::Reset => None,
        }
    }

    /// Returns the bands in committed-then-peak order (empty when reset).
    pub fn bands(&self) -> Vec<MeterBand> {
        match self.bands {
            CellBands::Modify { committed, peak } => vec![committed, peak],
            CellBands::Reset => Vec::new(),
        }
    }
}

impl fmt::Display for MeterCellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bands {
            CellBands::Reset => write!(f, "{} (default)", self.cell_id),
            CellBands::Modify { committed, peak } => {
                write!(f, "{} committed[{}] peak[{}]", self.cell_id, committed, peak)
            }
        }
    }
}
