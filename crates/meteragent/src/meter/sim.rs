//! In-memory P4Runtime device for simulation mode and tests.
//!
//! Every entry written or read passes through its protobuf encoding, so the
//! presence of `config` behaves as it would on a real connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use pi_types::{DeviceId, PipelineModel};
use prost::Message;
use tracing::debug;

use super::client::{ClientError, P4RuntimeClient};
use super::wire::{Index, MeterConfig, MeterEntry};

#[derive(Debug, Default)]
struct SimMeter {
    size: u64,
    cells: HashMap<i64, MeterConfig>,
}

/// Simulated devices keyed by device id.
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    devices: Mutex<HashMap<DeviceId, HashMap<u32, SimMeter>>>,
    write_calls: AtomicU64,
    entries_written: AtomicU64,
    read_calls: AtomicU64,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl SimulatedDevice {
    /// Creates a simulator with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device whose cells all start in the default state.
    pub fn add_device(&self, device_id: DeviceId, pipeline: &PipelineModel) {
        let meters = pipeline
            .meters()
            .iter()
            .map(|m| {
                (
                    m.p4_id,
                    SimMeter {
                        size: m.size,
                        cells: HashMap::new(),
                    },
                )
            })
            .collect();
        self.devices.lock().insert(device_id, meters);
    }

    /// Changes a cell behind the controller's back.
    pub fn inject(&self, device_id: &DeviceId, meter_id: u32, index: i64, config: Option<MeterConfig>) {
        let mut devices = self.devices.lock();
        if let Some(meter) = devices.get_mut(device_id).and_then(|d| d.get_mut(&meter_id)) {
            match config {
                Some(config) => meter.cells.insert(index, config),
                None => meter.cells.remove(&index),
            };
        }
    }

    /// Returns the config currently held by a cell.
    pub fn cell(&self, device_id: &DeviceId, meter_id: u32, index: i64) -> Option<MeterConfig> {
        self.devices
            .lock()
            .get(device_id)
            .and_then(|d| d.get(&meter_id))
            .and_then(|m| m.cells.get(&index).copied())
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of write batches received.
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Number of entries received across all write batches.
    pub fn entries_written(&self) -> u64 {
        self.entries_written.load(Ordering::SeqCst)
    }

    /// Number of read requests received.
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::SeqCst)
    }
}

fn through_wire(entry: &MeterEntry) -> Result<MeterEntry, ClientError> {
    MeterEntry::decode(entry.encode_to_vec().as_slice())
        .map_err(|e| ClientError::Rejected(e.to_string()))
}

impl P4RuntimeClient for SimulatedDevice {
    fn write(
        &self,
        device_id: &DeviceId,
        entries: &[MeterEntry],
    ) -> Result<Vec<Result<(), String>>, ClientError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientError::Unreachable(device_id.clone()));
        }

        let mut devices = self.devices.lock();
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| ClientError::Unreachable(device_id.clone()))?;

        let mut statuses = Vec::with_capacity(entries.len());
        for entry in entries {
            self.entries_written.fetch_add(1, Ordering::SeqCst);
            let entry = match through_wire(entry) {
                Ok(entry) => entry,
                Err(e) => {
                    statuses.push(Err(e.to_string()));
                    continue;
                }
            };
            let Some(meter) = device.get_mut(&entry.meter_id) else {
                statuses.push(Err(format!("unknown meter id {}", entry.meter_id)));
                continue;
            };
            let Some(Index { index }) = entry.index else {
                statuses.push(Err(format!("missing index for meter id {}", entry.meter_id)));
                continue;
            };
            if index < 0 || index as u64 >= meter.size {
                statuses.push(Err(format!("index {} out of range", index)));
                continue;
            }
            debug!(device_id = %device_id, meter_id = entry.meter_id, index, config = ?entry.config, "sim write");
            match entry.config {
                Some(config) => meter.cells.insert(index, config),
                None => meter.cells.remove(&index),
            };
            statuses.push(Ok(()));
        }
        Ok(statuses)
    }

    fn read_meter_cells(
        &self,
        device_id: &DeviceId,
        meter_ids: &[u32],
    ) -> Result<Vec<MeterEntry>, ClientError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Unreachable(device_id.clone()));
        }

        let devices = self.devices.lock();
        let device = devices
            .get(device_id)
            .ok_or_else(|| ClientError::Unreachable(device_id.clone()))?;

        let mut entries = Vec::new();
        for meter_id in meter_ids {
            let meter = device
                .get(meter_id)
                .ok_or_else(|| ClientError::Rejected(format!("unknown meter id {}", meter_id)))?;
            for index in 0..meter.size as i64 {
                let entry = MeterEntry {
                    meter_id: *meter_id,
                    index: Some(Index { index }),
                    config: meter.cells.get(&index).copied(),
                };
                entries.push(through_wire(&entry)?);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pi_types::{PiMeterId, PiMeterModel, PiMeterUnit};

    fn device() -> DeviceId {
        DeviceId::new("device:sim").unwrap()
    }

    fn sim() -> SimulatedDevice {
        let pipeline = PipelineModel::new(vec![PiMeterModel {
            id: PiMeterId::new("ingress.meter").unwrap(),
            p4_id: 5,
            size: 4,
            unit: PiMeterUnit::Bytes,
        }])
        .unwrap();
        let sim = SimulatedDevice::new();
        sim.add_device(device(), &pipeline);
        sim
    }

    fn entry(index: i64, config: Option<MeterConfig>) -> MeterEntry {
        MeterEntry {
            meter_id: 5,
            index: Some(Index { index }),
            config,
        }
    }

    #[test]
    fn test_write_then_read() {
        let sim = sim();
        let config = MeterConfig {
            cir: 100,
            cburst: 10,
            pir: 1000,
            pburst: 50,
        };

        let statuses = sim.write(&device(), &[entry(1, Some(config))]).unwrap();
        assert_eq!(statuses, vec![Ok(())]);
        assert_eq!(sim.cell(&device(), 5, 1), Some(config));

        let cells = sim.read_meter_cells(&device(), &[5]).unwrap();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[1].config, Some(config));
        assert_eq!(cells[0].config, None);
    }

    #[test]
    fn test_write_reset_clears_cell() {
        let sim = sim();
        sim.inject(&device(), 5, 2, Some(MeterConfig::default()));
        assert!(sim.cell(&device(), 5, 2).is_some());

        sim.write(&device(), &[entry(2, None)]).unwrap();
        assert!(sim.cell(&device(), 5, 2).is_none());
    }

    #[test]
    fn test_per_entry_rejection() {
        let sim = sim();
        let statuses = sim
            .write(&device(), &[entry(0, None), entry(10, None)])
            .unwrap();
        assert!(statuses[0].is_ok());
        assert!(statuses[1].is_err());
        assert_eq!(sim.write_calls(), 1);
        assert_eq!(sim.entries_written(), 2);
    }

    #[test]
    fn test_missing_index_is_rejected() {
        let sim = sim();
        let config = MeterConfig {
            cir: 1,
            cburst: 1,
            pir: 2,
            pburst: 2,
        };
        let keyless = MeterEntry {
            meter_id: 5,
            index: None,
            config: Some(config),
        };

        let statuses = sim
            .write(&device(), &[entry(1, Some(config)), keyless, entry(2, Some(config))])
            .unwrap();
        assert!(statuses[0].is_ok());
        assert!(statuses[1].is_err());
        assert!(statuses[2].is_ok());
        assert_eq!(sim.cell(&device(), 5, 0), None);
        assert_eq!(sim.cell(&device(), 5, 2), Some(config));
    }

    #[test]
    fn test_failure_injection() {
        let sim = sim();
        sim.set_fail_writes(true);
        assert!(sim.write(&device(), &[entry(0, None)]).is_err());

        sim.set_fail_reads(true);
        assert!(sim.read_meter_cells(&device(), &[5]).is_err());

        let unknown = DeviceId::new("device:other").unwrap();
        sim.set_fail_reads(false);
        assert_eq!(
            sim.read_meter_cells(&unknown, &[5]),
            Err(ClientError::Unreachable(unknown.clone()))
        );
    }
}
