//! End-to-end pipeline scenarios over the in-memory transport and stores

use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use vigil_core::{Device, DeviceId, DeviceStatus, FinalSnapshot, VigilError};
use vigil_monitor::{SessionConfig, SessionController, SessionEvent};
use vigil_store::{AlertStore, MemoryAlertLog, MemoryBlobStore, MemoryRegistry, RegistryStore};
use vigil_transport::{ConnectionState, DeviceSide, DisconnectReason, MemoryTransport};

const SENSOR_FRAME: &str =
    r#"{"type":"sensorUpdate","data":{"motion":{"x":0,"y":0,"z":1},"light":300,"temperature":22}}"#;
const TAMPER_FRAME: &str = r#"{"type":"tamperAlert","data":{"type":"tamper"}}"#;

fn security_frame(level: i64) -> String {
    format!(r#"{{"type":"securityUpdate","data":{{"level":{level}}}}}"#)
}

struct Harness {
    transport: MemoryTransport,
    registry: Arc<MemoryRegistry>,
    alerts: Arc<MemoryAlertLog>,
    blobs: Arc<MemoryBlobStore>,
    controller: Arc<SessionController>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Harness {
    async fn start() -> Self {
        let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
        let transport = MemoryTransport::new();
        let registry = Arc::new(MemoryRegistry::new());
        let alerts = Arc::new(MemoryAlertLog::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let (controller, events) = SessionController::start(
            Arc::new(transport.clone()),
            registry.clone(),
            alerts.clone(),
            blobs.clone(),
            SessionConfig::default(),
        )
        .await
        .unwrap();
        Self {
            transport,
            registry,
            alerts,
            blobs,
            controller,
            events,
        }
    }

    /// Register the device in both registry and transport, select it, and
    /// wait for the channel to open.
    async fn select(&mut self, id: &str) -> DeviceSide {
        self.registry.upsert(Device::active(id, 1)).await;
        let side = self.transport.register(DeviceId::new(id)).await;
        self.controller
            .select_device(Device::active(id, 1))
            .await
            .unwrap();
        self.wait_for(
            |event| matches!(event, SessionEvent::Connected { device_id } if device_id.as_str() == id),
        )
        .await;
        side
    }

    async fn next_event(&mut self) -> SessionEvent {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session event stream ended")
    }

    async fn wait_for(&mut self, predicate: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        loop {
            let event = self.next_event().await;
            if predicate(&event) {
                return event;
            }
        }
    }
}

#[tokio::test]
async fn test_tamper_capture_end_to_end() {
    let mut h = Harness::start().await;
    let device = h.select("d1").await;

    device.emit_frame(SENSOR_FRAME);
    device.emit_frame(TAMPER_FRAME);

    let event = h
        .wait_for(|event| matches!(event, SessionEvent::TamperCaptured { .. }))
        .await;
    let alert = assert_matches!(event, SessionEvent::TamperCaptured { alert } => alert);

    let key = alert.snapshot_ref.clone().expect("alert references snapshot");
    assert!(key.as_str().starts_with("finalSnapshots/d1_"));
    assert_eq!(alert.device_id.as_str(), "d1");
    assert_eq!(alert.kind, "tamper");

    // The sample was applied before the capture ran.
    let latest = h.controller.latest_sample().await.expect("sample applied");
    assert_eq!(latest.light, 300.0);
    assert_eq!(latest.motion.z, 1.0);

    // The stored payload is the frozen sample.
    let bytes = h.controller.download_snapshot(&alert).await.unwrap();
    let snapshot = FinalSnapshot::from_json_bytes(&bytes).unwrap();
    assert_eq!(snapshot.sample.light, 300.0);
    assert_eq!(snapshot.device_id.as_str(), "d1");

    // Exactly one alert record; status cache flipped to destroyed.
    assert_eq!(
        h.alerts.alerts_for(&DeviceId::new("d1")).await.unwrap().len(),
        1
    );
    assert!(h.registry.list().await.unwrap()[0].is_destroyed());
    assert!(h.controller.active_device().await.unwrap().is_destroyed());

    // The alert feed surfaced the new record.
    h.wait_for(|event| {
        matches!(event, SessionEvent::AlertsChanged { alerts, .. } if alerts.len() == 1)
    })
    .await;
    assert_eq!(h.controller.alert_history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_persist_creates_no_alert_record() {
    let mut h = Harness::start().await;
    let device = h.select("d1").await;
    h.blobs.set_fail_puts(true);

    device.emit_frame(SENSOR_FRAME);
    device.emit_frame(TAMPER_FRAME);

    let event = h
        .wait_for(|event| matches!(event, SessionEvent::CaptureFailed { .. }))
        .await;
    let error = assert_matches!(event, SessionEvent::CaptureFailed { error, .. } => error);
    assert_matches!(error, VigilError::SnapshotPersist { .. });

    assert!(h.alerts.alerts_for(&DeviceId::new("d1")).await.unwrap().is_empty());
    assert!(h.blobs.is_empty().await);
    assert!(!h.registry.list().await.unwrap()[0].is_destroyed());
    assert!(!h.controller.active_device().await.unwrap().is_destroyed());
}

#[tokio::test]
async fn test_simulation_off_receives_without_applying() {
    let mut h = Harness::start().await;
    let device = h.select("d1").await;

    h.controller.set_simulation(false);
    device.emit_frame(SENSOR_FRAME);
    // The security update is a sync point: it is processed after the
    // telemetry on the same in-order loop.
    device.emit_frame(security_frame(40));
    let event = h
        .wait_for(|event| matches!(event, SessionEvent::SecurityChanged { .. }))
        .await;
    let level = assert_matches!(event, SessionEvent::SecurityChanged { level, .. } => level);
    assert_eq!(level.value(), 40);

    assert!(h.controller.latest_sample().await.is_none());
    assert_eq!(
        h.controller.connection_state().await,
        Some(ConnectionState::Open)
    );

    h.controller.set_simulation(true);
    device.emit_frame(SENSOR_FRAME);
    device.emit_frame(security_frame(41));
    h.wait_for(|event| {
        matches!(event, SessionEvent::SecurityChanged { level, .. } if level.value() == 41)
    })
    .await;
    assert!(h.controller.latest_sample().await.is_some());
    assert_eq!(h.controller.history().await.len(), 1);
}

#[tokio::test]
async fn test_switch_closes_previous_device_first() {
    let mut h = Harness::start().await;
    let d1 = h.select("d1").await;

    d1.emit_frame(SENSOR_FRAME);
    d1.emit_frame(security_frame(50));
    h.wait_for(|event| matches!(event, SessionEvent::SecurityChanged { .. }))
        .await;
    assert!(h.controller.latest_sample().await.is_some());

    let _d2 = h.select("d2").await;

    // The previous transport is gone: frames from d1 no longer have a
    // listener.
    assert!(!d1.emit_frame(SENSOR_FRAME));
    // Fresh window and security level for d2.
    assert!(h.controller.latest_sample().await.is_none());
    assert!(h.controller.history().await.is_empty());
    assert_eq!(h.controller.active_device().await.unwrap().id.as_str(), "d2");
}

#[tokio::test]
async fn test_switch_emits_disconnect_before_new_connect() {
    let mut h = Harness::start().await;
    let _d1 = h.select("d1").await;

    h.registry.upsert(Device::active("d2", 1)).await;
    let _d2 = h.transport.register(DeviceId::new("d2")).await;
    h.controller
        .select_device(Device::active("d2", 1))
        .await
        .unwrap();

    // In stream order: d1 disconnects (requested) strictly before d2
    // connects.
    let mut saw_d1_disconnect = false;
    loop {
        match h.next_event().await {
            SessionEvent::Disconnected { device_id, reason } if device_id.as_str() == "d1" => {
                assert_eq!(reason, DisconnectReason::Requested);
                saw_d1_disconnect = true;
            }
            SessionEvent::Connected { device_id } if device_id.as_str() == "d2" => {
                assert!(saw_d1_disconnect, "d2 connected before d1 disconnected");
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_destroyed_device_cannot_be_selected() {
    let h = Harness::start().await;
    let err = h
        .controller
        .select_device(Device::new(DeviceId::new("dx"), DeviceStatus::Destroyed, 0))
        .await
        .unwrap_err();
    assert_matches!(err, VigilError::Invalid { .. });
}

#[tokio::test]
async fn test_simulate_tamper_reaches_device() {
    let mut h = Harness::start().await;
    let mut device = h.select("d1").await;

    h.controller.simulate_tamper().await.unwrap();
    assert_eq!(
        device.next_command().await.as_deref(),
        Some(r#"{"type":"simulateTamper","device_id":"d1"}"#)
    );
}

#[tokio::test]
async fn test_simulate_tamper_requires_open_channel() {
    let mut h = Harness::start().await;

    // Nothing selected yet.
    let err = h.controller.simulate_tamper().await.unwrap_err();
    assert_matches!(err, VigilError::Invalid { .. });

    // A device the transport cannot reach: the handshake fails and the
    // channel closes directly.
    h.registry.upsert(Device::active("ghost", 1)).await;
    h.controller
        .select_device(Device::active("ghost", 1))
        .await
        .unwrap();
    h.wait_for(|event| {
        matches!(
            event,
            SessionEvent::Disconnected {
                reason: DisconnectReason::HandshakeFailed { .. },
                ..
            }
        )
    })
    .await;

    let err = h.controller.simulate_tamper().await.unwrap_err();
    assert_matches!(err, VigilError::ChannelNotOpen { .. });
}

#[tokio::test]
async fn test_malformed_frame_is_surfaced_and_non_fatal() {
    let mut h = Harness::start().await;
    let device = h.select("d1").await;

    device.emit_frame("{not a frame");
    h.wait_for(|event| matches!(event, SessionEvent::ChannelError { .. }))
        .await;

    // The channel keeps delivering.
    device.emit_frame(SENSOR_FRAME);
    device.emit_frame(security_frame(60));
    h.wait_for(|event| matches!(event, SessionEvent::SecurityChanged { .. }))
        .await;
    assert!(h.controller.latest_sample().await.is_some());
}

#[tokio::test]
async fn test_registry_changes_are_surfaced() {
    let mut h = Harness::start().await;

    h.registry.upsert(Device::active("d1", 1)).await;
    h.wait_for(|event| {
        matches!(event, SessionEvent::DevicesChanged { devices } if devices.len() == 1)
    })
    .await;

    h.registry.upsert(Device::active("d2", 2)).await;
    h.wait_for(|event| {
        matches!(event, SessionEvent::DevicesChanged { devices } if devices.len() == 2)
    })
    .await;
    assert_eq!(h.controller.devices().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_shutdown_tears_everything_down() {
    let mut h = Harness::start().await;
    let d1 = h.select("d1").await;

    h.controller.shutdown().await;
    assert!(!d1.emit_frame(SENSOR_FRAME));
    assert!(h.controller.active_device().await.is_none());
}
