//! Unified in-memory transport implementation
//!
//! Backs tests and local simulation: each registered device gets a pair of
//! unbounded queues, and the returned [`DeviceSide`] plays the role of the
//! device firmware — emitting frames toward the client and observing the
//! control commands the client sent.

use crate::traits::{DeviceTransport, TransportConn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use vigil_core::{DeviceId, Result, VigilError};

struct Endpoint {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

/// In-memory transport for testing and local simulation
#[derive(Clone, Default)]
pub struct MemoryTransport {
    endpoints: Arc<Mutex<HashMap<DeviceId, Endpoint>>>,
}

impl MemoryTransport {
    /// Create a new memory transport with no reachable devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reachable device, returning its driver side
    ///
    /// The next `connect` for this device id consumes the registration;
    /// registering again replaces any unconsumed endpoint.
    pub async fn register(&self, device_id: DeviceId) -> DeviceSide {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        self.endpoints.lock().await.insert(
            device_id,
            Endpoint {
                inbound: frame_rx,
                outbound: command_tx,
            },
        );
        DeviceSide {
            frames: frame_tx,
            commands: command_rx,
        }
    }
}

#[async_trait]
impl DeviceTransport for MemoryTransport {
    async fn connect(&self, device_id: &DeviceId) -> Result<Box<dyn TransportConn>> {
        let endpoint = self
            .endpoints
            .lock()
            .await
            .remove(device_id)
            .ok_or_else(|| VigilError::connection(format!("device {device_id} is unreachable")))?;
        Ok(Box::new(MemoryConn {
            inbound: endpoint.inbound,
            outbound: Some(endpoint.outbound),
        }))
    }
}

struct MemoryConn {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl TransportConn for MemoryConn {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| VigilError::connection("connection closed"))?;
        outbound
            .send(text.to_string())
            .map_err(|_| VigilError::connection("peer disconnected"))
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        if self.outbound.is_none() {
            return Ok(None);
        }
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}

/// The device end of an in-memory connection
///
/// Tests and simulators drive this side: push frames the client will
/// receive, and observe the commands the client sent. Dropping it models
/// the remote end closing the stream.
pub struct DeviceSide {
    frames: mpsc::UnboundedSender<String>,
    commands: mpsc::UnboundedReceiver<String>,
}

impl DeviceSide {
    /// Emit a text frame toward the client
    ///
    /// Returns false once the client side is gone.
    pub fn emit_frame(&self, text: impl Into<String>) -> bool {
        self.frames.send(text.into()).is_ok()
    }

    /// Await the next control command sent by the client
    pub async fn next_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Non-blocking look at the next control command, if any arrived
    pub fn try_next_command(&mut self) -> Option<String> {
        self.commands.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_registration() {
        let transport = MemoryTransport::new();
        let err = transport.connect(&DeviceId::new("ghost")).await.err();
        assert!(matches!(err, Some(VigilError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let transport = MemoryTransport::new();
        let mut device = transport.register(DeviceId::new("d1")).await;
        let mut conn = transport.connect(&DeviceId::new("d1")).await.unwrap();

        assert!(device.emit_frame("hello"));
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some("hello"));

        conn.send_text("cmd").await.unwrap();
        assert_eq!(device.next_command().await.as_deref(), Some("cmd"));
    }

    #[tokio::test]
    async fn test_remote_close_ends_stream() {
        let transport = MemoryTransport::new();
        let device = transport.register(DeviceId::new("d1")).await;
        let mut conn = transport.connect(&DeviceId::new("d1")).await.unwrap();

        drop(device);
        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(conn.send_text("cmd").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_conn_is_inert() {
        let transport = MemoryTransport::new();
        let device = transport.register(DeviceId::new("d1")).await;
        let mut conn = transport.connect(&DeviceId::new("d1")).await.unwrap();

        device.emit_frame("late");
        conn.close().await;
        conn.close().await;
        assert!(conn.send_text("cmd").await.is_err());
        assert_eq!(conn.recv().await.unwrap(), None);
    }
}
