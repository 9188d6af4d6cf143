//! # Vigil Transport - Device Telemetry Channels
//!
//! One logical streaming session per monitored device. This crate owns the
//! wire layer and nothing else:
//!
//! - **Frame codec**: explicit decoding of JSON-framed device messages into
//!   typed inbound frames, and encoding of outbound control commands
//! - **Connection state machine**: `connecting -> open -> closed`, with
//!   `connecting -> closed` directly on handshake failure and no transition
//!   out of `closed`
//! - **Typed event stream**: each channel delivers its events in arrival
//!   order over a single receiver, consumed by one logical task
//! - **Pluggable transport**: the actual byte stream is injected through
//!   the [`DeviceTransport`] trait; an in-memory implementation backs tests
//!   and local simulation
//!
//! Business sequencing (tamper capture, aggregation, session lifecycle)
//! lives in `vigil-monitor`; this crate never touches a store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Telemetry channel state machine and event stream
pub mod channel;

/// Wire frame encoding and decoding
pub mod frame;

/// In-memory transport for tests and local simulation
pub mod memory;

/// Transport trait definitions
pub mod traits;

pub use channel::{
    ChannelConfig, ChannelEvent, ChannelHandle, ConnectionState, DisconnectReason,
    TelemetryChannel,
};
pub use frame::{InboundFrame, OutboundCommand, SensorUpdate, SecurityUpdate, TamperPayload};
pub use memory::{DeviceSide, MemoryTransport};
pub use traits::{DeviceTransport, TransportConn};
