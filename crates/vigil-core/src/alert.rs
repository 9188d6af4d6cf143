//! Tamper alerts and final snapshots
//!
//! A `TamperAlert` is append-only once created. Its `snapshot_ref` is set at
//! creation time by the capture coordinator and only after the snapshot
//! write succeeded, so no alert ever points at a snapshot that does not
//! exist.

use crate::identifiers::{AlertId, DeviceId, SnapshotKey};
use crate::telemetry::TelemetrySample;
use crate::{Result, VigilError};
use serde::{Deserialize, Serialize};

/// An alert record appended to the alert log after a tamper episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamperAlert {
    /// Alert record identity
    pub id: AlertId,
    /// Device the alert belongs to
    pub device_id: DeviceId,
    /// Alert type tag, e.g. "tamper"
    #[serde(rename = "type")]
    pub kind: String,
    /// Epoch milliseconds at which the capture completed
    pub timestamp: i64,
    /// Key of the persisted final snapshot, present only when the
    /// snapshot write succeeded before this record was created
    pub snapshot_ref: Option<SnapshotKey>,
}

impl TamperAlert {
    /// Create an alert record
    pub fn new(
        device_id: DeviceId,
        kind: impl Into<String>,
        timestamp: i64,
        snapshot_ref: Option<SnapshotKey>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            device_id,
            kind: kind.into(),
            timestamp,
            snapshot_ref,
        }
    }
}

/// The last known sensor state of a device, frozen at capture time
///
/// Serialized to JSON and stored in the blob store under
/// [`FinalSnapshot::key`]. Write-once; never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSnapshot {
    /// Device the snapshot belongs to
    pub device_id: DeviceId,
    /// The last telemetry sample observed before capture
    pub sample: TelemetrySample,
    /// Epoch milliseconds at which the capture ran
    pub captured_at: i64,
}

impl FinalSnapshot {
    /// Freeze the given sample into a snapshot
    pub fn new(device_id: DeviceId, sample: TelemetrySample, captured_at: i64) -> Self {
        Self {
            device_id,
            sample,
            captured_at,
        }
    }

    /// The globally unique storage key for this snapshot
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::derive(&self.device_id, self.captured_at)
    }

    /// Serialize the snapshot payload for blob storage
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VigilError::internal(e.to_string()))
    }

    /// Decode a stored snapshot payload
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| VigilError::snapshot_unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MotionVector;

    fn sample() -> TelemetrySample {
        TelemetrySample::new(MotionVector::new(0.0, 0.0, 1.0), 300.0, 22.0, 1_000)
    }

    #[test]
    fn test_snapshot_key_derivation() {
        let snapshot = FinalSnapshot::new(DeviceId::new("d1"), sample(), 2_000);
        assert_eq!(snapshot.key().as_str(), "finalSnapshots/d1_2000");
    }

    #[test]
    fn test_snapshot_payload_round_trip() {
        let snapshot = FinalSnapshot::new(DeviceId::new("d1"), sample(), 2_000);
        let bytes = snapshot.to_json_bytes().unwrap();
        let decoded = FinalSnapshot::from_json_bytes(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_alert_without_reference() {
        let alert = TamperAlert::new(DeviceId::new("d1"), "tamper", 3_000, None);
        assert!(alert.snapshot_ref.is_none());
        assert_eq!(alert.kind, "tamper");
    }
}
