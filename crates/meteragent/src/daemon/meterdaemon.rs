//! MeterDaemon implementation.
//!
//! The MeterDaemon drives a [`MeterOrch`]:
//! - Applies startup meter operations
//! - Periodically reconciles every known device
//! - Stops on request

use std::sync::Arc;
use std::time::Duration;

use pi_types::DeviceId;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::meter::{MeterOperation, MeterOrch, ReconcileReport};

/// Configuration for the MeterDaemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterDaemonConfig {
    /// Interval between reconciliation passes in milliseconds
    pub reconcile_interval_ms: u64,
}

impl Default for MeterDaemonConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: 5000,
        }
    }
}

/// Periodic meter reconciliation daemon.
pub struct MeterDaemon {
    config: MeterDaemonConfig,
    orch: Arc<MeterOrch>,
    shutdown: watch::Sender<bool>,
}

impl MeterDaemon {
    /// Creates a new MeterDaemon with the given configuration.
    pub fn new(config: MeterDaemonConfig, orch: Arc<MeterOrch>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            orch,
            shutdown,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MeterDaemonConfig {
        &self.config
    }

    /// Returns the orchestrator.
    pub fn orch(&self) -> &Arc<MeterOrch> {
        &self.orch
    }

    /// Applies operations in order and returns how many succeeded.
    pub async fn apply_operations(&self, operations: Vec<MeterOperation>) -> usize {
        let total = operations.len();
        let mut applied = 0;
        for op in operations {
            let op_type = op.op_type;
            let cell = op.meter.cell_id.clone();
            let device_id = op.meter.device_id.clone();
            if self.orch.perform_meter_operation(op).await {
                applied += 1;
            } else {
                warn!(device_id = %device_id, cell = %cell, op = op_type.as_str(), "Meter operation failed");
            }
        }
        info!(applied, total, "Applied meter operations");
        applied
    }

    /// Reconciles every device once, devices in parallel.
    ///
    /// Results are sorted by device id.
    pub async fn reconcile_once(&self) -> Vec<(DeviceId, ReconcileReport)> {
        let mut tasks = JoinSet::new();
        for device_id in self.orch.devices() {
            let orch = Arc::clone(&self.orch);
            tasks.spawn_blocking(move || {
                let report = orch.reconcile(&device_id);
                (device_id, report)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((device_id, report)) => {
                    debug!(
                        device_id = %device_id,
                        cells = report.cells_read,
                        meters = report.meters.len(),
                        reset = report.reset,
                        reset_failed = report.reset_failed,
                        "Reconciled device meters"
                    );
                    reports.push((device_id, report));
                }
                Err(e) => error!(error = %e, "Reconciliation task failed"),
            }
        }
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        reports
    }

    /// Builds a JSON view of reconciliation reports with each device's
    /// meter features and the orch statistics. No device is read again.
    pub async fn snapshot(&self, reports: Vec<(DeviceId, ReconcileReport)>) -> Value {
        let mut devices = Vec::with_capacity(reports.len());
        for (device_id, report) in reports {
            let features = self.orch.get_meter_features(&device_id).await;
            devices.push(json!({
                "device_id": device_id,
                "cells_read": report.cells_read,
                "undecodable": report.undecodable,
                "reset": report.reset,
                "reset_failed": report.reset_failed,
                "meters": report.meters,
                "features": features,
            }));
        }
        json!({
            "devices": devices,
            "stats": self.orch.stats(),
        })
    }

    /// Runs reconciliation passes until [`MeterDaemon::stop`] is called.
    pub async fn run(&self) {
        info!(
            interval_ms = self.config.reconcile_interval_ms,
            devices = self.orch.devices().len(),
            "Starting MeterDaemon reconciliation loop"
        );
        let mut shutdown = self.shutdown.subscribe();
        let interval = Duration::from_millis(self.config.reconcile_interval_ms);

        while !*shutdown.borrow() {
            self.reconcile_once().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("MeterDaemon reconciliation loop stopped");
    }

    /// Stops the reconciliation loop.
    pub fn stop(&self) {
        info!("Stopping MeterDaemon");
        self.shutdown.send_replace(true);
    }

    /// Returns true once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}
