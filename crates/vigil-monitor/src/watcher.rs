//! Device registry subscriptions
//!
//! Wraps the registry's watch channel in a pull-style subscription that
//! delivers the current list immediately and the full list again on every
//! registry change. Dropping the subscription unsubscribes.

use std::sync::Arc;
use tokio::sync::watch;
use vigil_core::{Device, Result};
use vigil_store::RegistryStore;

/// Subscribes to live device-record changes
pub struct DeviceRegistryWatcher;

impl DeviceRegistryWatcher {
    /// Subscribe to the registry
    ///
    /// Subscription failures surface here as a terminal error; retrying is
    /// the caller's decision.
    pub async fn subscribe(registry: &Arc<dyn RegistryStore>) -> Result<RegistrySubscription> {
        let rx = registry.watch().await?;
        Ok(RegistrySubscription {
            rx,
            deliver_current: true,
        })
    }
}

/// An open registry subscription
pub struct RegistrySubscription {
    rx: watch::Receiver<Vec<Device>>,
    deliver_current: bool,
}

impl RegistrySubscription {
    /// Next full device list
    ///
    /// The first call returns the current list; later calls wait for a
    /// change. Returns `None` once the registry side has gone away, which
    /// is terminal.
    pub async fn next(&mut self) -> Option<Vec<Device>> {
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
    use vigil_store::MemoryRegistry;

    #[tokio::test]
    async fn test_subscription_delivers_current_then_changes() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.upsert(Device::active("d1", 1)).await;

        let store: Arc<dyn RegistryStore> = registry.clone();
        let mut subscription = DeviceRegistryWatcher::subscribe(&store).await.unwrap();

        let initial = subscription.next().await.unwrap();
        assert_eq!(initial.len(), 1);

        registry.upsert(Device::active("d2", 2)).await;
        let updated = subscription.next().await.unwrap();
        assert_eq!(updated.len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_ends_when_registry_dropped() {
        let registry = Arc::new(MemoryRegistry::new());
        let store: Arc<dyn RegistryStore> = registry.clone();
        let mut subscription = DeviceRegistryWatcher::subscribe(&store).await.unwrap();
        assert!(subscription.next().await.is_some());

        drop(store);
        drop(registry);
        assert!(subscription.next().await.is_none());
    }
}
