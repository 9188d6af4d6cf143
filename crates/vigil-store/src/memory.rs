//! In-memory store implementations
//!
//! Back tests and local simulation. Interior state lives behind
//! `tokio::sync::RwLock`; change feeds are `watch` channels re-broadcasting
//! the full state after every mutation, matching the subscription contract
//! of the real stores.

use crate::traits::{AlertStore, BlobStore, RegistryStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::debug;
use vigil_core::{Device, DeviceId, DeviceStatus, Result, SnapshotKey, TamperAlert, VigilError};

/// In-memory device registry
pub struct MemoryRegistry {
    devices: RwLock<HashMap<DeviceId, Device>>,
    changes: watch::Sender<Vec<Device>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            devices: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Insert or replace a device record, notifying watchers
    pub async fn upsert(&self, device: Device) {
        let mut devices = self.devices.write().await;
        devices.insert(device.id.clone(), device);
        let snapshot: Vec<Device> = devices.values().cloned().collect();
        drop(devices);
        self.changes.send_replace(snapshot);
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn list(&self) -> Result<Vec<Device>> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn watch(&self) -> Result<watch::Receiver<Vec<Device>>> {
        // Seed the channel so a fresh subscriber sees the current list.
        let snapshot: Vec<Device> = self.devices.read().await.values().cloned().collect();
        self.changes.send_replace(snapshot);
        Ok(self.changes.subscribe())
    }

    async fn update_status(&self, device_id: &DeviceId, status: DeviceStatus) -> Result<()> {
        let mut devices = self.devices.write().await;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| VigilError::not_found(format!("device {device_id}")))?;
        device.status = status;
        let snapshot: Vec<Device> = devices.values().cloned().collect();
        drop(devices);
        debug!(device = %device_id, status = %status, "registry status cache updated");
        self.changes.send_replace(snapshot);
        Ok(())
    }
}

/// In-memory append-only alert log
pub struct MemoryAlertLog {
    alerts: RwLock<Vec<TamperAlert>>,
    watchers: RwLock<HashMap<DeviceId, watch::Sender<Vec<TamperAlert>>>>,
}

impl MemoryAlertLog {
    /// Create an empty alert log
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            watchers: RwLock::new(HashMap::new()),
        }
    }

    async fn device_alerts(&self, device_id: &DeviceId) -> Vec<TamperAlert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|alert| &alert.device_id == device_id)
            .cloned()
            .collect()
    }
}

impl Default for MemoryAlertLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertLog {
    async fn append(&self, alert: TamperAlert) -> Result<()> {
        let device_id = alert.device_id.clone();
        self.alerts.write().await.push(alert);
        if let Some(sender) = self.watchers.read().await.get(&device_id) {
            sender.send_replace(self.device_alerts(&device_id).await);
        }
        Ok(())
    }

    async fn alerts_for(&self, device_id: &DeviceId) -> Result<Vec<TamperAlert>> {
        Ok(self.device_alerts(device_id).await)
    }

    async fn watch(&self, device_id: &DeviceId) -> Result<watch::Receiver<Vec<TamperAlert>>> {
        let current = self.device_alerts(device_id).await;
        let mut watchers = self.watchers.write().await;
        let sender = watchers
            .entry(device_id.clone())
            .or_insert_with(|| watch::channel(Vec::new()).0);
        sender.send_replace(current);
        Ok(sender.subscribe())
    }
}

/// In-memory snapshot blob store
///
/// `fail_puts` injects persist failures for exercising the capture-abort
/// path in tests.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<SnapshotKey, StoredBlob>>,
    fail_puts: AtomicBool,
}

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

impl MemoryBlobStore {
    /// Create an empty blob store
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Make subsequent `put` calls fail until cleared
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds nothing
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Content type recorded for a key, if stored
    pub async fn content_type(&self, key: &SnapshotKey) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|blob| blob.content_type.clone())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &SnapshotKey, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(VigilError::storage(format!("put {key} refused by store")));
        }
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(key) {
            return Err(VigilError::storage(format!("key {key} already exists")));
        }
        blobs.insert(
            key.clone(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &SnapshotKey) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| VigilError::not_found(format!("blob {key}")))
    }

    async fn location(&self, key: &SnapshotKey) -> Result<String> {
        let blobs = self.blobs.read().await;
        if !blobs.contains_key(key) {
            return Err(VigilError::not_found(format!("blob {key}")));
        }
        Ok(format!("memory://{key}"))
    }
}
