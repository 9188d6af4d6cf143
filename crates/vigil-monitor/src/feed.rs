//! Per-device alert subscriptions
//!
//! Delivers the device's alert set on every change, in append order with
//! timestamps, so the presentation layer can sort most-recent-first.
//! A feed is scoped to exactly one device; the session closes the previous
//! device's feed before opening the next one.

use std::sync::Arc;
use tokio::sync::watch;
use vigil_core::{DeviceId, Result, TamperAlert};
use vigil_store::AlertStore;

/// Subscribes to alert-record changes for one device
pub struct AlertFeed;

impl AlertFeed {
    /// Subscribe to a device's alert set
    pub async fn subscribe(
        store: &Arc<dyn AlertStore>,
        device_id: &DeviceId,
    ) -> Result<AlertSubscription> {
        let rx = store.watch(device_id).await?;
        Ok(AlertSubscription {
            device_id: device_id.clone(),
            rx,
            deliver_current: true,
        })
    }
}

/// An open alert subscription
pub struct AlertSubscription {
    device_id: DeviceId,
    rx: watch::Receiver<Vec<TamperAlert>>,
    deliver_current: bool,
}

impl AlertSubscription {
    /// Device this subscription is scoped to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Next full alert set for the device
    ///
    /// The first call returns the current set; later calls wait for a
    /// change. Returns `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Vec<TamperAlert>> {
        if self.deliver_current {
            self.deliver_current = false;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_store::MemoryAlertLog;

    #[tokio::test]
    async fn test_feed_is_scoped_to_one_device() {
        let log = Arc::new(MemoryAlertLog::new());
        let store: Arc<dyn AlertStore> = log.clone();
        let mut feed = AlertFeed::subscribe(&store, &DeviceId::new("d1"))
            .await
            .unwrap();
        assert!(feed.next().await.unwrap().is_empty());

        log.append(TamperAlert::new(DeviceId::new("d1"), "tamper", 10, None))
            .await
            .unwrap();
        let alerts = feed.next().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].timestamp, 10);
        assert_eq!(feed.device_id().as_str(), "d1");
    }
}
