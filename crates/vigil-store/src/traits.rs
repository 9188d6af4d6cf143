//! Store trait definitions
//!
//! All three stores are object-safe so the pipeline takes them as
//! `Arc<dyn ...>`. Watch subscriptions hand out `tokio::sync::watch`
//! receivers: the receiver always holds the latest full state, dropping it
//! unsubscribes, and a dropped sender marks the subscription terminal.

use async_trait::async_trait;
use tokio::sync::watch;
use vigil_core::{Device, DeviceId, DeviceStatus, Result, SnapshotKey, TamperAlert};

/// Read/subscribe access to the device registry
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// All current device records
    async fn list(&self) -> Result<Vec<Device>>;

    /// Subscribe to registry changes
    ///
    /// The receiver holds the full current device list and is updated on
    /// every registry change.
    async fn watch(&self) -> Result<watch::Receiver<Vec<Device>>>;

    /// Local, non-authoritative status-cache update
    ///
    /// The registry remains authoritative; this records the core's view
    /// (e.g. `destroyed` after a completed capture) until the registry
    /// catches up.
    async fn update_status(&self, device_id: &DeviceId, status: DeviceStatus) -> Result<()>;
}

/// Append/query access to the alert log
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Append an alert record; records are never mutated afterwards
    async fn append(&self, alert: TamperAlert) -> Result<()>;

    /// All alerts for one device, in append order
    async fn alerts_for(&self, device_id: &DeviceId) -> Result<Vec<TamperAlert>>;

    /// Subscribe to the alert set of one device
    ///
    /// The receiver holds the device's full alert list and is updated on
    /// every append for that device.
    async fn watch(&self, device_id: &DeviceId) -> Result<watch::Receiver<Vec<TamperAlert>>>;
}

/// Put/get access to the snapshot blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a payload under a write-once key
    ///
    /// Fails if the key already exists; snapshots are content-addressed by
    /// key and never overwritten.
    async fn put(&self, key: &SnapshotKey, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch a stored payload by key
    async fn get(&self, key: &SnapshotKey) -> Result<Vec<u8>>;

    /// Resolve the download location for a stored key
    async fn location(&self, key: &SnapshotKey) -> Result<String>;
}
