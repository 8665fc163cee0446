//! Device and meter-cell identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a forwarding device (e.g. `device:leaf1`).
///
/// # Examples
///
/// ```
/// use pi_types::DeviceId;
///
/// let device: DeviceId = "device:leaf1".parse().unwrap();
/// assert_eq!(device.as_str(), "device:leaf1");
///
/// assert!("".parse::<DeviceId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new device id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseError::EmptyDeviceId);
        }
        Ok(DeviceId(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceId::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DeviceId::new(s)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// Name of a meter array in the device pipeline (e.g. `ingress.acl.meter`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PiMeterId(String);

impl PiMeterId {
    /// Creates a new meter id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseError::EmptyMeterId);
        }
        Ok(PiMeterId(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PiMeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PiMeterId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PiMeterId::new(s)
    }
}

impl TryFrom<String> for PiMeterId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PiMeterId::new(s)
    }
}

impl From<PiMeterId> for String {
    fn from(id: PiMeterId) -> Self {
        id.0
    }
}

/// One addressable cell of a meter array: `(meter id, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeterCellId {
    meter_id: PiMeterId,
    index: u64,
}

impl MeterCellId {
    /// Creates a cell id for the given meter array and index.
    pub fn new(meter_id: PiMeterId, index: u64) -> Self {
        Self { meter_id, index }
    }

    /// Returns the meter array this cell belongs to.
    pub fn meter_id(&self) -> &PiMeterId {
        &self.meter_id
    }

    /// Returns the index of the cell within its meter array.
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl fmt::Display for MeterCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.meter_id, self.index)
    }
}

/// Stable key correlating logical and device state for one cell of one device.
///
/// Used by both the translation store and the device mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeterCellHandle {
    device_id: DeviceId,
    cell_id: MeterCellId,
}

impl MeterCellHandle {
    /// Creates a handle for a cell on a device.
    pub fn new(device_id: DeviceId, cell_id: MeterCellId) -> Self {
        Self { device_id, cell_id }
    }

    /// Returns the device this handle refers to.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the cell this handle refers to.
    pub fn cell_id(&self) -> &MeterCellId {
        &self.cell_id
    }
}

impl fmt::Display for MeterCellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.cell_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_validation() {
        assert!(DeviceId::new("device:s1").is_ok());
        assert_eq!(DeviceId::new(""), Err(ParseError::EmptyDeviceId));
        assert_eq!(DeviceId::new("   "), Err(ParseError::EmptyDeviceId));
    }

    #[test]
    fn test_meter_id_validation() {
        assert!(PiMeterId::new("ingress.meter").is_ok());
        assert_eq!(PiMeterId::new(""), Err(ParseError::EmptyMeterId));
    }

    #[test]
    fn test_display() {
        let cell = MeterCellId::new(PiMeterId::new("ingress.meter").unwrap(), 7);
        assert_eq!(cell.to_string(), "ingress.meter[7]");

        let handle = MeterCellHandle::new(DeviceId::new("device:s1").unwrap(), cell);
        assert_eq!(handle.to_string(), "device:s1/ingress.meter[7]");
    }

    #[test]
    fn test_handle_equality_is_by_device_and_cell() {
        let meter = PiMeterId::new("m").unwrap();
        let dev1 = DeviceId::new("device:s1").unwrap();
        let dev2 = DeviceId::new("device:s2").unwrap();

        let a = MeterCellHandle::new(dev1.clone(), MeterCellId::new(meter.clone(), 0));
        let b = MeterCellHandle::new(dev1, MeterCellId::new(meter.clone(), 0));
        let c = MeterCellHandle::new(dev2, MeterCellId::new(meter, 0));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serde_rejects_empty_device_id() {
        let parsed: Result<DeviceId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: DeviceId = serde_json::from_str("\"device:s1\"").unwrap();
        assert_eq!(parsed.as_str(), "device:s1");
    }
}
