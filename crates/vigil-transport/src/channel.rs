//! Telemetry channel lifecycle and event delivery
//!
//! One channel per device session. Opening a channel spawns a single reader
//! task that owns the transport connection; every event the channel emits
//! flows through one queue in arrival order, so the consumer never observes
//! reordered telemetry or concurrent state mutation for one device.
//!
//! Lifecycle: `Connecting -> Open` on handshake success, `-> Closed` on
//! explicit close, transport failure, or remote close; `Connecting ->
//! Closed` directly on handshake failure. There is no transition out of
//! `Closed` — reopening a device means opening a new handle.

use crate::frame::{self, InboundFrame, OutboundCommand, TamperPayload};
use crate::traits::{DeviceTransport, TransportConn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use vigil_core::{now_millis, DeviceId, Result, SecurityLevel, TelemetrySample, VigilError};

/// Configuration for telemetry channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum time to wait for the transport handshake, in milliseconds
    pub handshake_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
        }
    }
}

/// Lifecycle state of one telemetry channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Channel is open and delivering events
    Open,
    /// Channel is closed; terminal
    Closed,
}

/// Why a channel reached the closed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// `close()` was called on the handle
    Requested,
    /// Handshake failed before the channel opened
    HandshakeFailed {
        /// Failure description
        message: String,
    },
    /// Transport failed while the channel was open
    Transport {
        /// Failure description
        message: String,
    },
    /// Remote end closed the stream
    Remote,
}

/// Typed event stream emitted by a telemetry channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake started; always the first event after `open`
    Connecting,
    /// Handshake succeeded; the channel is open
    Connected,
    /// The channel reached the closed state
    Disconnected {
        /// Why the channel closed
        reason: DisconnectReason,
    },
    /// Routine telemetry sample
    Telemetry(TelemetrySample),
    /// Tamper signal from the device
    TamperSignal(TamperPayload),
    /// Security level update
    SecurityUpdate(SecurityLevel),
    /// Observable, non-fatal channel error (malformed frame, failed write)
    Error {
        /// Error description
        message: String,
    },
}

/// Factory for per-device telemetry channels over an injected transport
pub struct TelemetryChannel {
    transport: Arc<dyn DeviceTransport>,
    config: ChannelConfig,
}

impl TelemetryChannel {
    /// Create a channel factory over the given transport
    pub fn new(transport: Arc<dyn DeviceTransport>, config: ChannelConfig) -> Self {
        Self { transport, config }
    }

    /// Begin a streaming session with a device
    ///
    /// Non-blocking: the handshake runs on the spawned reader task, and a
    /// `Connecting` event is observable on the returned stream immediately.
    pub fn open(
        &self,
        device_id: DeviceId,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let _ = events_tx.send(ChannelEvent::Connecting);
        debug!(device = %device_id, "telemetry channel opening");

        tokio::spawn(run_channel(
            device_id.clone(),
            Arc::clone(&self.transport),
            self.config.clone(),
            Arc::clone(&state),
            events_tx,
            outbound_rx,
            close_rx,
        ));

        let handle = ChannelHandle {
            device_id,
            state,
            outbound: outbound_tx,
            close_tx,
        };
        (handle, events_rx)
    }
}

/// Handle to one open (or opening) telemetry channel
pub struct ChannelHandle {
    device_id: DeviceId,
    state: Arc<RwLock<ConnectionState>>,
    outbound: mpsc::UnboundedSender<String>,
    close_tx: watch::Sender<bool>,
}

impl ChannelHandle {
    /// Device this channel belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Send a control command to the device
    ///
    /// Rejected with `ChannelNotOpen` unless the channel is open; otherwise
    /// best-effort with no acknowledgement guarantee. A rejected send never
    /// reaches the transport.
    pub async fn send(&self, command: OutboundCommand) -> Result<()> {
        if *self.state.read().await != ConnectionState::Open {
            return Err(VigilError::channel_not_open(format!(
                "device {}",
                self.device_id
            )));
        }
        let text = command.encode()?;
        self.outbound.send(text).map_err(|_| {
            VigilError::channel_not_open(format!("device {}", self.device_id))
        })
    }

    /// Close the channel; idempotent
    ///
    /// Sends are rejected as soon as this returns. Events already delivered
    /// to the stream remain for the consumer to process; frames arriving
    /// after the close is requested are dropped by the reader task.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }
        let _ = self.close_tx.send(true);
    }
}

async fn run_channel(
    device_id: DeviceId,
    transport: Arc<dyn DeviceTransport>,
    config: ChannelConfig,
    state: Arc<RwLock<ConnectionState>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut close_rx: watch::Receiver<bool>,
) {
    let handshake = tokio::time::timeout(
        Duration::from_millis(config.handshake_timeout_ms),
        transport.connect(&device_id),
    );

    let mut conn = tokio::select! {
        _ = close_rx.changed() => {
            finish(&device_id, &state, &events, DisconnectReason::Requested).await;
            return;
        }
        outcome = handshake => match outcome {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => {
                let message = err.to_string();
                let _ = events.send(ChannelEvent::Error { message: message.clone() });
                finish(
                    &device_id,
                    &state,
                    &events,
                    DisconnectReason::HandshakeFailed { message },
                )
                .await;
                return;
            }
            Err(_) => {
                let message =
                    format!("handshake timed out after {}ms", config.handshake_timeout_ms);
                let _ = events.send(ChannelEvent::Error { message: message.clone() });
                finish(
                    &device_id,
                    &state,
                    &events,
                    DisconnectReason::HandshakeFailed { message },
                )
                .await;
                return;
            }
        },
    };

    {
        let mut guard = state.write().await;
        // close() may have raced the handshake
        if *guard == ConnectionState::Closed {
            drop(guard);
            conn.close().await;
            let _ = events.send(ChannelEvent::Disconnected {
                reason: DisconnectReason::Requested,
            });
            return;
        }
        *guard = ConnectionState::Open;
    }
    let _ = events.send(ChannelEvent::Connected);
    info!(device = %device_id, "telemetry channel established");

    let reason = loop {
        tokio::select! {
            biased;
            _ = close_rx.changed() => break DisconnectReason::Requested,
            command = outbound.recv() => match command {
                Some(text) => {
                    if let Err(err) = conn.send_text(&text).await {
                        let message = err.to_string();
                        let _ = events.send(ChannelEvent::Error { message: message.clone() });
                        break DisconnectReason::Transport { message };
                    }
                }
                // All handles dropped; treat as a requested close.
                None => break DisconnectReason::Requested,
            },
            inbound = conn.recv() => match inbound {
                Ok(Some(text)) => dispatch_frame(&device_id, &text, &events),
                Ok(None) => break DisconnectReason::Remote,
                Err(err) => {
                    let message = err.to_string();
                    let _ = events.send(ChannelEvent::Error { message: message.clone() });
                    break DisconnectReason::Transport { message };
                }
            },
        }
    };

    conn.close().await;
    finish(&device_id, &state, &events, reason).await;
}

fn dispatch_frame(
    device_id: &DeviceId,
    text: &str,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) {
    match frame::decode(text) {
        Ok(InboundFrame::SensorUpdate(update)) => {
            let _ = events.send(ChannelEvent::Telemetry(update.into_sample(now_millis())));
        }
        Ok(InboundFrame::TamperAlert(payload)) => {
            warn!(device = %device_id, kind = %payload.kind, "tamper signal received");
            let _ = events.send(ChannelEvent::TamperSignal(payload));
        }
        Ok(InboundFrame::SecurityUpdate(update)) => {
            let _ = events.send(ChannelEvent::SecurityUpdate(SecurityLevel::from_raw(
                update.level,
            )));
        }
        Err(err) => {
            warn!(device = %device_id, error = %err, "dropping malformed frame");
            let _ = events.send(ChannelEvent::Error {
                message: err.to_string(),
            });
        }
    }
}

async fn finish(
    device_id: &DeviceId,
    state: &Arc<RwLock<ConnectionState>>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    reason: DisconnectReason,
) {
    *state.write().await = ConnectionState::Closed;
    info!(device = %device_id, reason = ?reason, "telemetry channel closed");
    let _ = events.send(ChannelEvent::Disconnected { reason });
}
