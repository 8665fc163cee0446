//! P4Runtime client contract for meter entities.
//!
//! The transport itself lives outside this crate. Implementations submit the
//! given entries and block until the device answers; timeouts and retries are
//! the transport's concern.

use pi_meter_common::{WriteEntityResponse, WriteRequest, WriteResponse};
use pi_types::{DeviceId, MeterCellConfig, MeterCellId, PiMeterId, PipelineModel};
use thiserror::Error;
use tracing::{debug, warn};

use super::codec::{CodecError, MeterEntryCodec};
use super::wire::MeterEntry;

/// Client error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("device {0} is not reachable")]
    Unreachable(DeviceId),

    #[error("request rejected by device: {0}")]
    Rejected(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Synchronous P4Runtime operations on meter entries.
pub trait P4RuntimeClient: Send + Sync {
    /// Submits MODIFY updates for the given entries.
    ///
    /// Returns one status per entry, in order. `Err` means the whole batch
    /// failed before reaching the device.
    fn write(
        &self,
        device_id: &DeviceId,
        entries: &[MeterEntry],
    ) -> Result<Vec<Result<(), String>>, ClientError>;

    /// Reads every cell of the given meter arrays.
    fn read_meter_cells(
        &self,
        device_id: &DeviceId,
        meter_ids: &[u32],
    ) -> Result<Vec<MeterEntry>, ClientError>;
}

/// Encodes and submits a write request, waiting for the device response.
///
/// If any config fails to encode nothing is sent and every entity is
/// reported as failed.
pub fn submit_sync(
    client: &dyn P4RuntimeClient,
    pipeline: &PipelineModel,
    request: &WriteRequest,
) -> WriteResponse {
    let codec = MeterEntryCodec::new(pipeline);
    let entries = match request
        .pending_updates()
        .iter()
        .map(|config| codec.encode(config))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(entries) => entries,
        Err(e) => {
            warn!(device_id = %request.device_id(), error = %e, "Unable to encode meter write request");
            return WriteResponse::all_failed(request, &e.to_string());
        }
    };

    let statuses = match client.write(request.device_id(), &entries) {
        Ok(statuses) => statuses,
        Err(e) => {
            warn!(device_id = %request.device_id(), error = %e, "Meter write request failed");
            return WriteResponse::all_failed(request, &e.to_string());
        }
    };

    let mut statuses = statuses.into_iter();
    let entities = request
        .pending_updates()
        .iter()
        .map(|config| {
            let error = match statuses.next() {
                Some(Ok(())) => None,
                Some(Err(reason)) => Some(reason),
                None => Some("no status returned for entity".to_string()),
            };
            WriteEntityResponse {
                config: config.clone(),
                error,
            }
        })
        .collect();

    let response = WriteResponse::new(request.device_id().clone(), entities);
    for failed in response.failed_entities() {
        debug!(
            device_id = %request.device_id(),
            config = %failed.config,
            error = failed.error.as_deref().unwrap_or_default(),
            "Meter cell write rejected"
        );
    }
    response
}

/// Cells observed by a bulk read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterCellReadout {
    /// Cells whose config decoded.
    pub configs: Vec<MeterCellConfig>,
    /// Cells whose config the device reported but could not be decoded.
    pub undecodable: Vec<MeterCellId>,
}

impl MeterCellReadout {
    /// Returns the number of cells observed.
    pub fn len(&self) -> usize {
        self.configs.len() + self.undecodable.len()
    }

    /// Returns true if no cell was observed.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty() && self.undecodable.is_empty()
    }
}

/// Reads and decodes every cell of the given meter arrays.
///
/// A cell whose config cannot be decoded is reported in
/// [`MeterCellReadout::undecodable`]. Entries that do not even address a
/// known cell are logged and skipped.
pub fn read_meter_cells_sync(
    client: &dyn P4RuntimeClient,
    device_id: &DeviceId,
    pipeline: &PipelineModel,
    meter_ids: &[PiMeterId],
) -> Result<MeterCellReadout, ClientError> {
    let codec = MeterEntryCodec::new(pipeline);
    let p4_ids = meter_ids
        .iter()
        .map(|id| {
            pipeline
                .meter(id)
                .map(|m| m.p4_id)
                .ok_or_else(|| CodecError::UnknownMeter(id.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entries = client.read_meter_cells(device_id, &p4_ids)?;
    let mut readout = MeterCellReadout::default();
    for entry in &entries {
        match codec.decode(entry) {
            Ok(config) => readout.configs.push(config),
            Err(e) => match codec.decode_key(entry) {
                Ok(cell_id) => {
                    warn!(device_id = %device_id, cell = %cell_id, error = %e, "Undecodable meter cell config");
                    readout.undecodable.push(cell_id);
                }
                Err(_) => {
                    warn!(device_id = %device_id, error = %e, "Skipping undecodable meter entry");
                }
            },
        }
    }
    Ok(readout)
}
