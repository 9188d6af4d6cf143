//! Session orchestration
//!
//! The controller owns the "active device" selection and the per-device
//! resource bundle behind it: telemetry channel, alert feed, rolling
//! window, security level, and cached device record. Selecting a new
//! device tears the previous bundle down completely before the new one
//! opens, so no event from the previous device is ever observed after the
//! switch.
//!
//! Simulation mode gates whether inbound telemetry is applied to the
//! window; with it off the channel keeps delivering (no error) but the
//! window stays untouched. Tamper and security events are processed
//! regardless.

use crate::aggregator::{AggregatorConfig, TelemetryAggregator};
use crate::capture::{CaptureOutcome, TamperCaptureCoordinator};
use crate::feed::AlertFeed;
use crate::watcher::DeviceRegistryWatcher;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vigil_core::{
    Device, DeviceId, DeviceStatus, Result, SecurityLevel, TamperAlert, TelemetrySample,
    VigilError,
};
use vigil_store::{AlertStore, BlobStore, RegistryStore};
use vigil_transport::{
    ChannelConfig, ChannelEvent, ChannelHandle, ConnectionState, DeviceTransport,
    DisconnectReason, OutboundCommand, TelemetryChannel,
};

/// Configuration for a monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether inbound telemetry is applied to the window at start
    pub simulate_on_start: bool,
    /// Channel configuration used for every device selection
    pub channel: ChannelConfig,
    /// Rolling window configuration
    pub aggregator: AggregatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulate_on_start: true,
            channel: ChannelConfig::default(),
            aggregator: AggregatorConfig::default(),
        }
    }
}

/// Operator-facing session notices
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The registry delivered a new device list
    DevicesChanged {
        /// Full current device list, in registry order
        devices: Vec<Device>,
    },
    /// The active device's channel opened
    Connected {
        /// Device that connected
        device_id: DeviceId,
    },
    /// The active device's channel closed
    Disconnected {
        /// Device that disconnected
        device_id: DeviceId,
        /// Why the channel closed
        reason: DisconnectReason,
    },
    /// A non-fatal channel error (malformed frame, failed write)
    ChannelError {
        /// Device the error belongs to
        device_id: DeviceId,
        /// Error description
        message: String,
    },
    /// The device reported a new security level
    SecurityChanged {
        /// Device the level belongs to
        device_id: DeviceId,
        /// Clamped security level
        level: SecurityLevel,
    },
    /// The active device's alert set changed
    AlertsChanged {
        /// Device the alerts belong to
        device_id: DeviceId,
        /// Full alert set in append order
        alerts: Vec<TamperAlert>,
    },
    /// A tamper capture ran to completion
    TamperCaptured {
        /// The appended alert, referencing the persisted snapshot
        alert: TamperAlert,
    },
    /// A tamper capture aborted before an alert was created
    CaptureFailed {
        /// Device whose capture failed
        device_id: DeviceId,
        /// The surfaced error
        error: VigilError,
    },
}

struct ActiveDevice {
    device: Arc<SyncMutex<Device>>,
    handle: ChannelHandle,
    pump: JoinHandle<()>,
    feed_stop: watch::Sender<bool>,
    feed_task: JoinHandle<()>,
    aggregator: Arc<SyncMutex<TelemetryAggregator>>,
    security: Arc<SyncMutex<SecurityLevel>>,
}

/// Top-level orchestrator for one operator session
pub struct SessionController {
    channels: TelemetryChannel,
    registry: Arc<dyn RegistryStore>,
    alerts: Arc<dyn AlertStore>,
    coordinator: Arc<TamperCaptureCoordinator>,
    config: SessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    simulating: Arc<AtomicBool>,
    active: Mutex<Option<ActiveDevice>>,
    registry_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Start a session over the given collaborators
    ///
    /// Subscribes to the registry immediately; every registry change is
    /// surfaced as [`SessionEvent::DevicesChanged`] on the returned stream.
    pub async fn start(
        transport: Arc<dyn DeviceTransport>,
        registry: Arc<dyn RegistryStore>,
        alerts: Arc<dyn AlertStore>,
        blobs: Arc<dyn BlobStore>,
        config: SessionConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(TamperCaptureCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&alerts),
            blobs,
        ));

        let controller = Arc::new(Self {
            channels: TelemetryChannel::new(transport, config.channel.clone()),
            registry: Arc::clone(&registry),
            alerts,
            coordinator,
            simulating: Arc::new(AtomicBool::new(config.simulate_on_start)),
            config,
            events: events_tx.clone(),
            active: Mutex::new(None),
            registry_task: SyncMutex::new(None),
        });

        let mut subscription = DeviceRegistryWatcher::subscribe(&registry).await?;
        let task = tokio::spawn(async move {
            while let Some(devices) = subscription.next().await {
                if events_tx
                    .send(SessionEvent::DevicesChanged { devices })
                    .is_err()
                {
                    break;
                }
            }
            debug!("registry subscription ended");
        });
        *controller.registry_task.lock() = Some(task);

        Ok((controller, events_rx))
    }

    /// Make a device the active one
    ///
    /// Closes the previous device's channel and alert feed before anything
    /// for the new device opens, and starts the new device with a fresh,
    /// empty telemetry window. Destroyed devices are rejected.
    pub async fn select_device(&self, device: Device) -> Result<()> {
        if device.is_destroyed() {
            return Err(VigilError::invalid(format!(
                "device {} is destroyed",
                device.id
            )));
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            teardown(previous).await;
        }
        info!(device = %device.id, "device selected");

        let feed = AlertFeed::subscribe(&self.alerts, &device.id).await?;
        let (feed_stop, feed_stop_rx) = watch::channel(false);
        let feed_task = tokio::spawn(run_alert_feed(
            feed,
            feed_stop_rx,
            device.id.clone(),
            self.events.clone(),
        ));

        let aggregator = Arc::new(SyncMutex::new(TelemetryAggregator::new(
            self.config.aggregator.clone(),
        )));
        let security = Arc::new(SyncMutex::new(SecurityLevel::default()));
        let cached = Arc::new(SyncMutex::new(device.clone()));

        let (handle, channel_events) = self.channels.open(device.id.clone());
        let pump = tokio::spawn(pump_channel_events(PumpContext {
            events: channel_events,
            device_id: device.id,
            coordinator: Arc::clone(&self.coordinator),
            aggregator: Arc::clone(&aggregator),
            security: Arc::clone(&security),
            cached: Arc::clone(&cached),
            simulating: Arc::clone(&self.simulating),
            session_events: self.events.clone(),
        }));

        *active = Some(ActiveDevice {
            device: cached,
            handle,
            pump,
            feed_stop,
            feed_task,
            aggregator,
            security,
        });
        Ok(())
    }

    /// Toggle whether inbound telemetry is applied to the window
    pub fn set_simulation(&self, enabled: bool) {
        self.simulating.store(enabled, Ordering::SeqCst);
        info!(enabled, "simulation mode toggled");
    }

    /// Whether telemetry is currently applied to the window
    pub fn is_simulating(&self) -> bool {
        self.simulating.load(Ordering::SeqCst)
    }

    /// Ask the active device to simulate a tamper event
    ///
    /// Fails with `ChannelNotOpen` when the channel is not open; a rejected
    /// send never reaches the transport.
    pub async fn simulate_tamper(&self) -> Result<()> {
        let active = self.active.lock().await;
        let session = active
            .as_ref()
            .ok_or_else(|| VigilError::invalid("no device selected"))?;
        session
            .handle
            .send(OutboundCommand::simulate_tamper(
                session.handle.device_id().clone(),
            ))
            .await
    }

    /// Fetch the snapshot payload an alert references
    pub async fn download_snapshot(&self, alert: &TamperAlert) -> Result<Vec<u8>> {
        self.coordinator.retrieve_snapshot(alert).await
    }

    /// Resolve the download location for an alert's snapshot
    pub async fn snapshot_location(&self, alert: &TamperAlert) -> Result<String> {
        self.coordinator.snapshot_location(alert).await
    }

    /// All current device records from the registry
    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.registry.list().await
    }

    /// The cached record of the active device, if any
    pub async fn active_device(&self) -> Option<Device> {
        let active = self.active.lock().await;
        active.as_ref().map(|session| session.device.lock().clone())
    }

    /// Connection state of the active device's channel
    pub async fn connection_state(&self) -> Option<ConnectionState> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(session) => Some(session.handle.state().await),
            None => None,
        }
    }

    /// Most recent sample in the active device's window
    pub async fn latest_sample(&self) -> Option<TelemetrySample> {
        let active = self.active.lock().await;
        active
            .as_ref()
            .and_then(|session| session.aggregator.lock().latest().copied())
    }

    /// The active device's window in arrival order
    pub async fn history(&self) -> Vec<TelemetrySample> {
        let active = self.active.lock().await;
        active
            .as_ref()
            .map(|session| session.aggregator.lock().history())
            .unwrap_or_default()
    }

    /// Last reported security level of the active device
    pub async fn security_level(&self) -> Option<SecurityLevel> {
        let active = self.active.lock().await;
        active.as_ref().map(|session| *session.security.lock())
    }

    /// Alert history of the active device, in append order
    pub async fn alert_history(&self) -> Result<Vec<TamperAlert>> {
        let device_id = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .map(|session| session.device.lock().id.clone())
                .ok_or_else(|| VigilError::invalid("no device selected"))?
        };
        self.alerts.alerts_for(&device_id).await
    }

    /// Tear down the active device session and the registry subscription
    pub async fn shutdown(&self) {
        if let Some(active) = self.active.lock().await.take() {
            teardown(active).await;
        }
        if let Some(task) = self.registry_task.lock().take() {
            task.abort();
        }
        info!("session shut down");
    }
}

async fn teardown(previous: ActiveDevice) {
    let device_id = previous.handle.device_id().clone();
    previous.handle.close().await;
    // The channel task ends after its terminal event, which ends the pump
    // once every event delivered before the close has been processed.
    let _ = previous.pump.await;
    let _ = previous.feed_stop.send(true);
    let _ = previous.feed_task.await;
    debug!(device = %device_id, "previous device session torn down");
}

async fn run_alert_feed(
    mut feed: crate::feed::AlertSubscription,
    mut stop: watch::Receiver<bool>,
    device_id: DeviceId,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            alerts = feed.next() => match alerts {
                Some(alerts) => {
                    let event = SessionEvent::AlertsChanged {
                        device_id: device_id.clone(),
                        alerts,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

struct PumpContext {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    device_id: DeviceId,
    coordinator: Arc<TamperCaptureCoordinator>,
    aggregator: Arc<SyncMutex<TelemetryAggregator>>,
    security: Arc<SyncMutex<SecurityLevel>>,
    cached: Arc<SyncMutex<Device>>,
    simulating: Arc<AtomicBool>,
    session_events: mpsc::UnboundedSender<SessionEvent>,
}

async fn pump_channel_events(mut ctx: PumpContext) {
    while let Some(event) = ctx.events.recv().await {
        match event {
            ChannelEvent::Connecting => {}
            ChannelEvent::Connected => {
                let _ = ctx.session_events.send(SessionEvent::Connected {
                    device_id: ctx.device_id.clone(),
                });
            }
            ChannelEvent::Disconnected { reason } => {
                let _ = ctx.session_events.send(SessionEvent::Disconnected {
                    device_id: ctx.device_id.clone(),
                    reason,
                });
            }
            ChannelEvent::Telemetry(sample) => {
                if ctx.simulating.load(Ordering::SeqCst) {
                    ctx.aggregator.lock().push(sample);
                }
            }
            ChannelEvent::TamperSignal(payload) => {
                let latest = ctx.aggregator.lock().latest().copied();
                let coordinator = Arc::clone(&ctx.coordinator);
                let cached = Arc::clone(&ctx.cached);
                let session_events = ctx.session_events.clone();
                let device_id = ctx.device_id.clone();
                // The capture runs off the pump so later telemetry keeps
                // flowing; the coordinator's guard coalesces overlapping
                // signals.
                tokio::spawn(async move {
                    match coordinator.capture(&device_id, &payload, latest).await {
                        Ok(CaptureOutcome::Captured(alert)) => {
                            cached.lock().status = DeviceStatus::Destroyed;
                            let _ =
                                session_events.send(SessionEvent::TamperCaptured { alert });
                        }
                        Ok(CaptureOutcome::Coalesced) => {
                            debug!(device = %device_id, "tamper signal coalesced");
                        }
                        Err(error) => {
                            warn!(device = %device_id, error = %error, "tamper capture failed");
                            let _ = session_events.send(SessionEvent::CaptureFailed {
                                device_id: device_id.clone(),
                                error,
                            });
                        }
                    }
                });
            }
            ChannelEvent::SecurityUpdate(level) => {
                *ctx.security.lock() = level;
                let _ = ctx.session_events.send(SessionEvent::SecurityChanged {
                    device_id: ctx.device_id.clone(),
                    level,
                });
            }
            ChannelEvent::Error { message } => {
                let _ = ctx.session_events.send(SessionEvent::ChannelError {
                    device_id: ctx.device_id.clone(),
                    message,
                });
            }
        }
    }
}
