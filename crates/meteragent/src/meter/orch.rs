//! MeterOrch implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pi_meter_common::{
    MeterMirror, StripedLock, TranslatedEntity, TranslationError, TranslationStore, WriteRequest,
};
use pi_types::{
    Band, DeviceId, Meter, MeterCellConfig, MeterCellHandle, MeterCellId, MeterFeatures,
    MeterState, PiMeterId, PipelineModel,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::client::{read_meter_cells_sync, submit_sync, ClientError, P4RuntimeClient};
use super::features::MeterFeaturesBuilder;

/// Default number of per-device write lock stripes.
pub const DEFAULT_LOCK_STRIPES: usize = 30;

/// Meter operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterOperationType {
    Add,
    Modify,
    Remove,
}

impl MeterOperationType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        }
    }
}

/// A request to install, change or remove one meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterOperation {
    pub op_type: MeterOperationType,
    pub meter: Meter,
}

impl MeterOperation {
    pub fn new(op_type: MeterOperationType, meter: Meter) -> Self {
        Self { op_type, meter }
    }

    pub fn add(meter: Meter) -> Self {
        Self::new(MeterOperationType::Add, meter)
    }

    pub fn modify(meter: Meter) -> Self {
        Self::new(MeterOperationType::Modify, meter)
    }

    pub fn remove(meter: Meter) -> Self {
        Self::new(MeterOperationType::Remove, meter)
    }
}

/// Source of static pipeline metadata per device.
pub trait PipelineProvider: Send + Sync {
    /// Returns the pipeline of a device, if known.
    fn pipeline(&self, device_id: &DeviceId) -> Option<Arc<PipelineModel>>;

    /// Returns every device with a known pipeline.
    fn devices(&self) -> Vec<DeviceId>;
}

/// Fixed set of device pipelines.
#[derive(Debug, Clone, Default)]
pub struct StaticPipelines {
    pipelines: HashMap<DeviceId, Arc<PipelineModel>>,
}

impl StaticPipelines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the pipeline of a device, replacing any previous one.
    pub fn insert(&mut self, device_id: DeviceId, pipeline: PipelineModel) {
        self.pipelines.insert(device_id, Arc::new(pipeline));
    }
}

impl PipelineProvider for StaticPipelines {
    fn pipeline(&self, device_id: &DeviceId) -> Option<Arc<PipelineModel>> {
        self.pipelines.get(device_id).cloned()
    }

    fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<_> = self.pipelines.keys().cloned().collect();
        devices.sort();
        devices
    }
}

/// Meter orchestrator error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterOrchError {
    #[error("no pipeline known for device {0}")]
    NoPipeline(DeviceId),

    #[error("unable to translate meter: {0}")]
    Translation(#[from] TranslationError),

    #[error("write to device {device_id} failed: {reason}")]
    WriteFailed { device_id: DeviceId, reason: String },

    #[error("read from device failed: {0}")]
    ReadFailed(#[from] ClientError),
}

/// Meter orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterOrchConfig {
    /// Number of stripes in the per-device write lock pool.
    pub lock_stripes: usize,
}

impl Default for MeterOrchConfig {
    fn default() -> Self {
        Self {
            lock_stripes: DEFAULT_LOCK_STRIPES,
        }
    }
}

/// Meter orchestrator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeterOrchStats {
    /// Number of operations received.
    pub operations: u64,
    /// Number of single-cell writes sent to devices.
    pub writes_submitted: u64,
    /// Number of writes skipped because the device already held the config.
    pub writes_skipped: u64,
    /// Number of single-cell writes the device rejected.
    pub write_failures: u64,
    /// Number of meters that could not be translated.
    pub translation_failures: u64,
    /// Number of reconciliation reads.
    pub reconciliations: u64,
    /// Number of inconsistent cells reset to default.
    pub cells_reset: u64,
    /// Number of inconsistent cells whose reset failed.
    pub reset_failures: u64,
}

/// Outcome of one reconciliation read of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Meters whose device state matches the recorded intent.
    pub meters: Vec<Meter>,
    /// Number of cells read from the device.
    pub cells_read: usize,
    /// Number of inconsistent cells reset to default.
    pub reset: usize,
    /// Number of inconsistent cells whose reset failed.
    pub reset_failed: usize,
    /// Number of cells whose device config could not be decoded.
    pub undecodable: usize,
}

enum CellCheck {
    Consistent(Meter),
    Default,
    Inconsistent,
}

/// Meter write coordinator and reconciliation reader.
///
/// Writes to one device are serialized through a striped lock pool; writes
/// to different devices proceed in parallel unless their ids share a stripe.
/// Reads are not serialized against writes.
pub struct MeterOrch {
    config: MeterOrchConfig,
    client: Arc<dyn P4RuntimeClient>,
    translator: Arc<dyn TranslationStore>,
    mirror: Arc<dyn MeterMirror>,
    pipelines: Arc<dyn PipelineProvider>,
    write_locks: StripedLock,
    stats: Mutex<MeterOrchStats>,
}

impl std::fmt::Debug for MeterOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterOrch")
            .field("config", &self.config)
            .field("lock_stripes", &self.write_locks.stripe_count())
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

impl MeterOrch {
    /// Creates a new MeterOrch with its collaborators.
    pub fn new(
        config: MeterOrchConfig,
        client: Arc<dyn P4RuntimeClient>,
        translator: Arc<dyn TranslationStore>,
        mirror: Arc<dyn MeterMirror>,
        pipelines: Arc<dyn PipelineProvider>,
    ) -> Self {
        let write_locks = StripedLock::new(config.lock_stripes);
        Self {
            config,
            client,
            translator,
            mirror,
            pipelines,
            write_locks,
            stats: Mutex::new(MeterOrchStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MeterOrchConfig {
        &self.config
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> MeterOrchStats {
        self.stats.lock().clone()
    }

    /// Returns the devices this orch can program.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.pipelines.devices()
    }

    /// Performs a meter operation on a blocking worker.
    ///
    /// Resolves to `true` once the device holds the requested config.
    pub async fn perform_meter_operation(self: &Arc<Self>, op: MeterOperation) -> bool {
        let orch = Arc::clone(self);
        match tokio::task::spawn_blocking(move || orch.process_meter_op(&op)).await {
            Ok(result) => result.is_ok(),
            Err(e) => {
                error!(error = %e, "Meter operation task failed");
                false
            }
        }
    }

    /// Performs a meter operation, blocking the calling thread.
    ///
    /// The device's write lock is held from translation until the mirror is
    /// updated. The translation store is updated before the write is sent,
    /// the mirror only after the device accepts it.
    pub fn process_meter_op(&self, op: &MeterOperation) -> Result<(), MeterOrchError> {
        let device_id = &op.meter.device_id;
        let Some(pipeline) = self.pipelines.pipeline(device_id) else {
            warn!(device_id = %device_id, op = op.op_type.as_str(), "No pipeline for device, aborting meter operation");
            return Err(MeterOrchError::NoPipeline(device_id.clone()));
        };
        let handle = MeterCellHandle::new(device_id.clone(), op.meter.cell_id.clone());

        let _guard = self.write_locks.lock(device_id);
        self.stats.lock().operations += 1;

        let config = match op.op_type {
            MeterOperationType::Add | MeterOperationType::Modify => {
                let config = match self.translator.translate(&op.meter, &pipeline) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(
                            handle = %handle,
                            op = op.op_type.as_str(),
                            error = %e,
                            "Unable to translate meter, aborting meter operation"
                        );
                        self.stats.lock().translation_failures += 1;
                        return Err(e.into());
                    }
                };
                self.translator.learn(
                    handle.clone(),
                    TranslatedEntity::new(op.meter.clone(), config.clone(), handle.clone()),
                );
                config
            }
            MeterOperationType::Remove => {
                self.translator.forget(&handle);
                MeterCellConfig::reset(op.meter.cell_id.clone())
            }
        };

        let mut request = WriteRequest::new(device_id.clone());
        if self.append_entry_or_skip(&mut request, &handle, config) {
            self.stats.lock().writes_skipped += 1;
            return Ok(());
        }

        self.stats.lock().writes_submitted += 1;
        let response = submit_sync(self.client.as_ref(), &pipeline, &request);
        if let Some(failed) = response.failed_entities().next() {
            let reason = failed.error.clone().unwrap_or_default();
            warn!(handle = %handle, op = op.op_type.as_str(), error = %reason, "Meter write failed");
            self.stats.lock().write_failures += 1;
            return Err(MeterOrchError::WriteFailed {
                device_id: device_id.clone(),
                reason,
            });
        }

        self.mirror.apply_write_request(&request);
        debug!(handle = %handle, op = op.op_type.as_str(), "Meter operation applied");
        Ok(())
    }

    /// Reads every meter cell of a device and returns the consistent meters.
    ///
    /// Inconsistent cells are reset on the device and left out of the
    /// result. Read failures yield an empty collection.
    pub async fn get_meters(self: &Arc<Self>, device_id: &DeviceId) -> Vec<Meter> {
        let orch = Arc::clone(self);
        let device_id = device_id.clone();
        match tokio::task::spawn_blocking(move || orch.reconcile(&device_id)).await {
            Ok(report) => report.meters,
            Err(e) => {
                error!(error = %e, "Meter read task failed");
                Vec::new()
            }
        }
    }

    /// Returns the meter features of every meter array of a device.
    pub async fn get_meter_features(&self, device_id: &DeviceId) -> Vec<MeterFeatures> {
        self.meter_features(device_id)
    }

    /// Synchronous form of [`MeterOrch::get_meter_features`].
    pub fn meter_features(&self, device_id: &DeviceId) -> Vec<MeterFeatures> {
        match self.pipelines.pipeline(device_id) {
            Some(pipeline) => pipeline
                .meters()
                .iter()
                .map(|m| MeterFeaturesBuilder::new(m, device_id).build())
                .collect(),
            None => {
                debug!(device_id = %device_id, "No pipeline for device, no meter features");
                Vec::new()
            }
        }
    }

    /// Reads every meter cell of a device, blocking the calling thread.
    ///
    /// The mirror is refreshed with every observed cell. Cells that hold
    /// state with no recorded intent, or state that differs from the recorded
    /// intent, are reset to default in a single best-effort batch. Cells whose
    /// config cannot be decoded are always reset.
    pub fn reconcile(&self, device_id: &DeviceId) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let Some(pipeline) = self.pipelines.pipeline(device_id) else {
            warn!(device_id = %device_id, "No pipeline for device, skipping meter read");
            return report;
        };
        self.stats.lock().reconciliations += 1;

        let meter_ids: Vec<PiMeterId> = pipeline.meters().iter().map(|m| m.id.clone()).collect();
        let readout = match read_meter_cells_sync(
            self.client.as_ref(),
            device_id,
            &pipeline,
            &meter_ids,
        ) {
            Ok(readout) => readout,
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Unable to read meter cells");
                return report;
            }
        };

        self.mirror.sync(device_id, &readout.configs);
        report.cells_read = readout.len();
        report.undecodable = readout.undecodable.len();
        if readout.is_empty() {
            return report;
        }

        let mut inconsistent_cells: Vec<MeterCellId> = Vec::new();
        for config in &readout.configs {
            let handle = MeterCellHandle::new(device_id.clone(), config.cell_id().clone());
            match self.check_cell(config, &handle) {
                CellCheck::Consistent(meter) => report.meters.push(meter),
                CellCheck::Default => {}
                CellCheck::Inconsistent => inconsistent_cells.push(config.cell_id().clone()),
            }
        }

        let mut request = WriteRequest::new(device_id.clone());
        for cell_id in inconsistent_cells {
            let handle = MeterCellHandle::new(device_id.clone(), cell_id.clone());
            self.append_entry_or_skip(&mut request, &handle, MeterCellConfig::reset(cell_id));
        }
        // The mirror cannot hold what the device reported for these cells,
        // so the reset is never skipped.
        for cell_id in readout.undecodable {
            request.entity(MeterCellConfig::reset(cell_id));
        }

        if !request.is_empty() {
            let response = submit_sync(self.client.as_ref(), &pipeline, &request);
            self.mirror.apply_write_response(&response);

            report.reset = response.success_entities().count();
            report.reset_failed = response.failed_entities().count();
            let mut stats = self.stats.lock();
            stats.cells_reset += report.reset as u64;
            stats.reset_failures += report.reset_failed as u64;
        }

        if report.reset > 0 || report.reset_failed > 0 {
            info!(
                device_id = %device_id,
                reset = report.reset,
                reset_failed = report.reset_failed,
                "Reset inconsistent meter cells"
            );
        }
        report
    }

    fn check_cell(&self, config: &MeterCellConfig, handle: &MeterCellHandle) -> CellCheck {
        let Some(entity) = self.translator.lookup(handle) else {
            if config.is_default_config() {
                debug!(handle = %handle, "Default meter cell with no translation, skipping");
                return CellCheck::Default;
            }
            warn!(
                handle = %handle,
                device = %config,
                "Meter cell config on device differs from translation store (store=default)"
            );
            return CellCheck::Inconsistent;
        };

        if entity.translated() != config {
            warn!(
                handle = %handle,
                device = %config,
                store = %entity.translated(),
                "Meter cell config on device differs from translation store"
            );
            return CellCheck::Inconsistent;
        }

        if self.mirror.get(handle).is_none() {
            warn!(handle = %handle, "Meter cell handle not found in device mirror");
            return CellCheck::Inconsistent;
        }

        // The device only echoes cell id and bands; nothing else survives.
        let bands = config
            .bands()
            .into_iter()
            .map(|b| Band::new(b.rate, b.burst))
            .collect();
        CellCheck::Consistent(
            Meter::new(handle.device_id().clone(), config.cell_id().clone(), bands)
                .with_state(MeterState::Added),
        )
    }

    /// Adds `config` to `request` unless the mirror shows the device already
    /// holds it. Returns true if the write was skipped.
    fn append_entry_or_skip(
        &self,
        request: &mut WriteRequest,
        handle: &MeterCellHandle,
        config: MeterCellConfig,
    ) -> bool {
        if let Some(on_device) = self.mirror.get(handle) {
            if on_device.entry() == &config {
                debug!(handle = %handle, config = %config, "Ignoring re-apply of existing meter cell config");
                return true;
            }
        }
        request.entity(config);
        false
    }
}
