//! Device mirror: last known device-side config per meter cell.
//!
//! Entries are written after every successful device write and every bulk
//! read. They are never removed: resetting a cell leaves an entry holding the
//! default config.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pi_types::{DeviceId, MeterCellConfig, MeterCellHandle};
use tracing::trace;

use crate::{WriteRequest, WriteResponse};

/// A value together with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEntry<T> {
    timestamp: DateTime<Utc>,
    entry: T,
}

impl<T> TimedEntry<T> {
    /// Wraps a value with the current time.
    pub fn now(entry: T) -> Self {
        Self {
            timestamp: Utc::now(),
            entry,
        }
    }

    /// Returns when the value was recorded.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the value.
    pub fn entry(&self) -> &T {
        &self.entry
    }
}

/// Cache of the device-side config of meter cells.
pub trait MeterMirror: Send + Sync {
    /// Returns the last known config for a handle.
    fn get(&self, handle: &MeterCellHandle) -> Option<TimedEntry<MeterCellConfig>>;

    /// Records a config for a handle, replacing any previous entry.
    fn put(&self, handle: MeterCellHandle, config: MeterCellConfig);

    /// Returns all entries of a device.
    fn get_all(&self, device_id: &DeviceId) -> Vec<(MeterCellHandle, TimedEntry<MeterCellConfig>)>;

    /// Records the configs observed by a bulk read of a device.
    fn sync(&self, device_id: &DeviceId, observed: &[MeterCellConfig]) {
        for config in observed {
            self.put(
                MeterCellHandle::new(device_id.clone(), config.cell_id().clone()),
                config.clone(),
            );
        }
    }

    /// Records every config of a request the device fully accepted.
    fn apply_write_request(&self, request: &WriteRequest) {
        for config in request.pending_updates() {
            self.put(
                MeterCellHandle::new(request.device_id().clone(), config.cell_id().clone()),
                config.clone(),
            );
        }
    }

    /// Records the configs of a response the device accepted, ignoring failures.
    fn apply_write_response(&self, response: &WriteResponse) {
        for config in response.success_entities() {
            self.put(
                MeterCellHandle::new(response.device_id().clone(), config.cell_id().clone()),
                config.clone(),
            );
        }
    }
}

/// In-process [`MeterMirror`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryMeterMirror {
    entries: DashMap<MeterCellHandle, TimedEntry<MeterCellConfig>>,
}

impl InMemoryMeterMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of mirrored cells across all devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mirrored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MeterMirror for InMemoryMeterMirror {
    fn get(&self, handle: &MeterCellHandle) -> Option<TimedEntry<MeterCellConfig>> {
        self.entries.get(handle).map(|e| e.value().clone())
    }

    fn put(&self, handle: MeterCellHandle, config: MeterCellConfig) {
        trace!(handle = %handle, config = %config, "mirror put");
        self.entries.insert(handle, TimedEntry::now(config));
    }

    fn get_all(&self, device_id: &DeviceId) -> Vec<(MeterCellHandle, TimedEntry<MeterCellConfig>)> {
        self.entries
            .iter()
            .filter(|e| e.key().device_id() == device_id)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteEntityResponse;
    use pi_types::{MeterBand, MeterCellId, PiMeterId};
    use pretty_assertions::assert_eq;

    fn device() -> DeviceId {
        DeviceId::new("device:s1").unwrap()
    }

    fn cell(index: u64) -> MeterCellId {
        MeterCellId::new(PiMeterId::new("ingress.meter").unwrap(), index)
    }

    fn handle(index: u64) -> MeterCellHandle {
        MeterCellHandle::new(device(), cell(index))
    }

    fn active(index: u64) -> MeterCellConfig {
        MeterCellConfig::modify(cell(index), MeterBand::new(100, 10), MeterBand::new(1000, 50))
    }

    #[test]
    fn test_put_and_get() {
        let mirror = InMemoryMeterMirror::new();
        assert!(mirror.get(&handle(0)).is_none());

        mirror.put(handle(0), active(0));
        let entry = mirror.get(&handle(0)).unwrap();
        assert_eq!(entry.entry(), &active(0));
        assert!(entry.timestamp() <= Utc::now());
    }

    #[test]
    fn test_sync_records_every_observed_cell() {
        let mirror = InMemoryMeterMirror::new();
        mirror.sync(
            &device(),
            &[active(0), MeterCellConfig::reset(cell(1))],
        );

        assert_eq!(mirror.len(), 2);
        assert!(mirror.get(&handle(1)).unwrap().entry().is_default_config());
        assert_eq!(mirror.get_all(&device()).len(), 2);
    }

    #[test]
    fn test_reset_leaves_default_entry() {
        let mirror = InMemoryMeterMirror::new();
        mirror.put(handle(0), active(0));

        let mut request = WriteRequest::new(device());
        request.entity(MeterCellConfig::reset(cell(0)));
        mirror.apply_write_request(&request);

        let entry = mirror.get(&handle(0)).unwrap();
        assert!(entry.entry().is_default_config());
    }

    #[test]
    fn test_apply_write_response_skips_failures() {
        let mirror = InMemoryMeterMirror::new();
        mirror.put(handle(0), active(0));
        mirror.put(handle(1), active(1));

        let response = WriteResponse::new(
            device(),
            vec![
                WriteEntityResponse { config: MeterCellConfig::reset(cell(0)), error: None },
                WriteEntityResponse {
                    config: MeterCellConfig::reset(cell(1)),
                    error: Some("rejected".to_string()),
                },
            ],
        );
        mirror.apply_write_response(&response);

        assert!(mirror.get(&handle(0)).unwrap().entry().is_default_config());
        assert_eq!(mirror.get(&handle(1)).unwrap().entry(), &active(1));
    }

    #[test]
    fn test_get_all_filters_by_device() {
        let mirror = InMemoryMeterMirror::new();
        let other = DeviceId::new("device:s2").unwrap();
        mirror.put(handle(0), active(0));
        mirror.put(MeterCellHandle::new(other.clone(), cell(0)), active(0));

        assert_eq!(mirror.get_all(&device()).len(), 1);
        assert_eq!(mirror.get_all(&other).len(), 1);
    }
}
