//! Tamper capture sequencing
//!
//! On a tamper signal the coordinator freezes the device's last known
//! sample into a final snapshot, persists it, and only then appends the
//! alert record carrying the snapshot key. A failed persist aborts the
//! sequence before any alert exists, so no alert ever references a
//! snapshot that was not written.
//!
//! Captures are serialized per device by an in-flight guard: a second
//! tamper signal while one capture runs is coalesced, and the guard clears
//! on completion or failure so a later signal can retry.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vigil_core::{
    now_millis, DeviceId, DeviceStatus, FinalSnapshot, Result, TamperAlert, TelemetrySample,
    VigilError,
};
use vigil_store::{AlertStore, BlobStore, RegistryStore};
use vigil_transport::TamperPayload;

/// Outcome of handling one tamper signal
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// The sequence ran to completion; the alert references the snapshot
    Captured(TamperAlert),
    /// A capture for this device was already in flight; signal ignored
    Coalesced,
}

/// Executes the capture sequence exactly once per tamper episode
pub struct TamperCaptureCoordinator {
    registry: Arc<dyn RegistryStore>,
    alerts: Arc<dyn AlertStore>,
    blobs: Arc<dyn BlobStore>,
    in_flight: Arc<Mutex<HashSet<DeviceId>>>,
}

impl TamperCaptureCoordinator {
    /// Create a coordinator over the given stores
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        alerts: Arc<dyn AlertStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            registry,
            alerts,
            blobs,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run the capture sequence for one tamper signal
    ///
    /// `latest` is the best-known sample for the device; a device that
    /// never reported telemetry is captured with the zeroed sample.
    pub async fn capture(
        &self,
        device_id: &DeviceId,
        payload: &TamperPayload,
        latest: Option<TelemetrySample>,
    ) -> Result<CaptureOutcome> {
        let _guard = match InFlightGuard::acquire(&self.in_flight, device_id) {
            Some(guard) => guard,
            None => {
                debug!(device = %device_id, "capture in flight, coalescing tamper signal");
                return Ok(CaptureOutcome::Coalesced);
            }
        };

        let captured_at = now_millis();
        let sample = latest.unwrap_or_else(|| TelemetrySample::zeroed(captured_at));
        let snapshot = FinalSnapshot::new(device_id.clone(), sample, captured_at);
        let key = snapshot.key();
        let bytes = snapshot.to_json_bytes()?;

        info!(device = %device_id, key = %key, "persisting final snapshot");
        self.blobs
            .put(&key, bytes, "application/json")
            .await
            .map_err(|err| {
                warn!(
                    device = %device_id,
                    key = %key,
                    error = %err,
                    "snapshot persist failed, capture aborted"
                );
                VigilError::snapshot_persist(err.to_string())
            })?;

        let alert = TamperAlert::new(
            device_id.clone(),
            payload.kind.clone(),
            captured_at,
            Some(key),
        );
        self.alerts.append(alert.clone()).await?;

        // The status cache is non-authoritative; a miss here does not undo
        // a completed capture.
        if let Err(err) = self
            .registry
            .update_status(device_id, DeviceStatus::Destroyed)
            .await
        {
            warn!(device = %device_id, error = %err, "status cache update failed");
        }

        info!(device = %device_id, alert = %alert.id, "tamper capture completed");
        Ok(CaptureOutcome::Captured(alert))
    }

    /// Fetch the persisted snapshot payload an alert references
    ///
    /// Fails with `SnapshotUnavailable` when the alert carries no
    /// reference or the fetch fails; the alert record itself is never
    /// touched.
    pub async fn retrieve_snapshot(&self, alert: &TamperAlert) -> Result<Vec<u8>> {
        let key = alert.snapshot_ref.as_ref().ok_or_else(|| {
            VigilError::snapshot_unavailable(format!("alert {} has no snapshot reference", alert.id))
        })?;
        self.blobs
            .get(key)
            .await
            .map_err(|err| VigilError::snapshot_unavailable(err.to_string()))
    }

    /// Resolve the download location for an alert's snapshot
    pub async fn snapshot_location(&self, alert: &TamperAlert) -> Result<String> {
        let key = alert.snapshot_ref.as_ref().ok_or_else(|| {
            VigilError::snapshot_unavailable(format!("alert {} has no snapshot reference", alert.id))
        })?;
        self.blobs
            .location(key)
            .await
            .map_err(|err| VigilError::snapshot_unavailable(err.to_string()))
    }
}

struct InFlightGuard {
    set: Arc<Mutex<HashSet<DeviceId>>>,
    device_id: DeviceId,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<DeviceId>>>, device_id: &DeviceId) -> Option<Self> {
        if !set.lock().insert(device_id.clone()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            device_id: device_id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.device_id);
    }
}
