//! Device records as cached from the registry
//!
//! The registry is authoritative for device state. The core holds a
//! read-only cached copy per active device and only ever writes the local,
//! non-authoritative status cache after a completed capture.

use crate::identifiers::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a monitored device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device is reachable and streaming
    Active,
    /// Device tampered; final snapshot captured, no longer reachable
    Destroyed,
    /// Status not yet reported by the registry
    Unknown,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Destroyed => write!(f, "destroyed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A device record owned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Registry-assigned identity
    pub id: DeviceId,
    /// Last known lifecycle status
    pub status: DeviceStatus,
    /// Epoch milliseconds of the last registry-observed contact
    pub last_seen: i64,
}

impl Device {
    /// Create a device record
    pub fn new(id: DeviceId, status: DeviceStatus, last_seen: i64) -> Self {
        Self {
            id,
            status,
            last_seen,
        }
    }

    /// Create an active device record
    pub fn active(id: impl Into<DeviceId>, last_seen: i64) -> Self {
        Self::new(id.into(), DeviceStatus::Active, last_seen)
    }

    /// Whether this device has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.status == DeviceStatus::Destroyed
    }
}
