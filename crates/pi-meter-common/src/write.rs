//! Write batches and their per-entity outcome.
//!
//! Meter cells always exist on the device, so every update in a batch is a
//! MODIFY of the cell config; a reset is a MODIFY to the default config.

use pi_types::{DeviceId, MeterCellConfig};

/// A batch of cell configs to write to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    device_id: DeviceId,
    updates: Vec<MeterCellConfig>,
}

impl WriteRequest {
    /// Creates an empty request for a device.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            updates: Vec::new(),
        }
    }

    /// Appends a cell config to the batch.
    pub fn entity(&mut self, config: MeterCellConfig) -> &mut Self {
        self.updates.push(config);
        self
    }

    /// Returns the target device.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the configs waiting to be submitted.
    pub fn pending_updates(&self) -> &[MeterCellConfig] {
        &self.updates
    }

    /// Returns true if nothing needs to be submitted.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Outcome of one entity of a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntityResponse {
    /// The config that was submitted.
    pub config: MeterCellConfig,
    /// Device or transport error, `None` on success.
    pub error: Option<String>,
}

impl WriteEntityResponse {
    /// Returns true if the device accepted the entity.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    device_id: DeviceId,
    entities: Vec<WriteEntityResponse>,
}

impl WriteResponse {
    /// Creates a response from per-entity outcomes.
    pub fn new(device_id: DeviceId, entities: Vec<WriteEntityResponse>) -> Self {
        Self {
            device_id,
            entities,
        }
    }

    /// Creates a response in which every entity of `request` failed with `reason`.
    pub fn all_failed(request: &WriteRequest, reason: &str) -> Self {
        let entities = request
            .pending_updates()
            .iter()
            .map(|config| WriteEntityResponse {
                config: config.clone(),
                error: Some(reason.to_string()),
            })
            .collect();
        Self::new(request.device_id().clone(), entities)
    }

    /// Returns the target device.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns all per-entity outcomes.
    pub fn entities(&self) -> &[WriteEntityResponse] {
        &self.entities
    }

    /// Returns true if every entity was accepted.
    pub fn is_success(&self) -> bool {
        self.entities.iter().all(WriteEntityResponse::is_success)
    }

    /// Returns the configs the device accepted.
    pub fn success_entities(&self) -> impl Iterator<Item = &MeterCellConfig> {
        self.entities
            .iter()
            .filter(|e| e.is_success())
            .map(|e| &e.config)
    }

    /// Returns the entities the device rejected.
    pub fn failed_entities(&self) -> impl Iterator<Item = &WriteEntityResponse> {
        self.entities.iter().filter(|e| !e.is_success())
    }
}
