//! Core identifier types used across the Vigil pipeline
//!
//! Identifiers are opaque newtypes: the registry owns device identity, the
//! blob store owns snapshot keys, and nothing in the core ever inspects
//! their contents beyond formatting.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Device identifier
///
/// Opaque identity assigned by the device registry. The core treats it as a
/// routing key; it never parses or derives meaning from the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a device ID from a registry-assigned identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Alert record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertId(pub Uuid);

impl AlertId {
    /// Create a new random alert ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert-{}", self.0)
    }
}

impl From<Uuid> for AlertId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Storage key for a persisted final snapshot
///
/// Globally unique per capture: `finalSnapshots/{deviceId}_{epochMillis}`.
/// Snapshots are write-once and content-addressed by this key, so a key is
/// only ever derived, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotKey(pub String);

impl SnapshotKey {
    /// Derive the snapshot key for a device capture at the given time
    pub fn derive(device_id: &DeviceId, captured_at: i64) -> Self {
        Self(format!("finalSnapshots/{}_{captured_at}", device_id.as_str()))
    }

    /// Create from an existing stored key
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
