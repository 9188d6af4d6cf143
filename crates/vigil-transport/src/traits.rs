//! Core transport trait definitions

use async_trait::async_trait;
use vigil_core::{DeviceId, Result};

/// Factory for streaming connections to devices
///
/// Implementations own addressing and the handshake; the channel layer owns
/// everything above the byte stream. `connect` is the handshake: it resolves
/// once the session is usable or fails with a connection error.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Establish a streaming connection to the given device
    async fn connect(&self, device_id: &DeviceId) -> Result<Box<dyn TransportConn>>;
}

/// One established streaming connection
#[async_trait]
pub trait TransportConn: Send {
    /// Send a text frame; best-effort, no acknowledgement at this layer
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Receive the next inbound text frame
    ///
    /// Returns `Ok(None)` when the remote end closed the stream cleanly and
    /// `Err` on transport failure. Must be cancellation-safe: a `recv`
    /// future dropped before completion must not lose a frame.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Release transport resources; safe to call more than once
    async fn close(&mut self);
}
