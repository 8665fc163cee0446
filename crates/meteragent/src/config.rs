//! Agent configuration loaded from YAML.
//!
//! # Example
//!
//! ```yaml
//! lock_stripes: 30
//! reconcile_interval_ms: 5000
//! devices:
//!   - id: "device:leaf1"
//!     pipeline:
//!       meters:
//!         - id: ingress.acl.meter
//!           p4_id: 335581151
//!           size: 1024
//!           unit: BYTES
//!     operations:
//!       - op: ADD
//!         meter_id: ingress.acl.meter
//!         index: 0
//!         bands:
//!           - { rate: 100, burst_size: 10 }
//!           - { rate: 1000, burst_size: 50 }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pi_types::{Band, DeviceId, Meter, MeterCellId, MeterUnit, PiMeterId, PipelineModel};
use serde::Deserialize;
use thiserror::Error;

use crate::meter::{MeterOperation, MeterOperationType, MeterOrchConfig, DEFAULT_LOCK_STRIPES};

/// Default interval between reconciliation reads.
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 5000;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One meter operation applied at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationConfig {
    pub op: MeterOperationType,
    pub meter_id: PiMeterId,
    pub index: u64,
    #[serde(default)]
    pub bands: Vec<Band>,
    #[serde(default)]
    pub unit: Option<MeterUnit>,
}

impl OperationConfig {
    /// Builds the operation for a device.
    pub fn to_operation(&self, device_id: &DeviceId) -> MeterOperation {
        let mut meter = Meter::new(
            device_id.clone(),
            MeterCellId::new(self.meter_id.clone(), self.index),
            self.bands.clone(),
        );
        meter.unit = self.unit;
        MeterOperation::new(self.op, meter)
    }
}

/// A device and its static pipeline metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub pipeline: PipelineModel,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

/// Top-level agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_lock_stripes() -> usize {
    DEFAULT_LOCK_STRIPES
}

fn default_reconcile_interval_ms() -> u64 {
    DEFAULT_RECONCILE_INTERVAL_MS
}

impl AgentConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates a configuration document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_stripes == 0 {
            return Err(ConfigError::Invalid("lock_stripes must be > 0".to_string()));
        }
        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconcile_interval_ms must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(&device.id) {
                return Err(ConfigError::Invalid(format!("duplicate device {}", device.id)));
            }
        }
        Ok(())
    }

    /// Returns the orchestrator settings.
    pub fn orch_config(&self) -> MeterOrchConfig {
        MeterOrchConfig {
            lock_stripes: self.lock_stripes,
        }
    }
}
