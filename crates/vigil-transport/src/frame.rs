//! Wire frame encoding and decoding
//!
//! Devices speak JSON frames of the shape `{"type": ..., "data": ...}`.
//! Decoding text into a typed frame is an explicit step with its own error
//! path: a malformed frame is reported and dropped by the channel, never
//! silently swallowed and never fatal to the session.

use serde::{Deserialize, Serialize};
use vigil_core::{DeviceId, MotionVector, Result, TelemetrySample, VigilError};

/// A decoded inbound device frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundFrame {
    /// Routine sensor reading
    #[serde(rename = "sensorUpdate")]
    SensorUpdate(SensorUpdate),
    /// Physical/security compromise signal
    #[serde(rename = "tamperAlert")]
    TamperAlert(TamperPayload),
    /// Security level change
    #[serde(rename = "securityUpdate")]
    SecurityUpdate(SecurityUpdate),
}

/// Sensor reading payload of a `sensorUpdate` frame
///
/// The wire carries no timestamp; samples are stamped at decode time by
/// the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    /// Motion reading
    pub motion: MotionVector,
    /// Light level in lux
    pub light: f64,
    /// Temperature in degrees Celsius
    pub temperature: f64,
}

impl SensorUpdate {
    /// Stamp this reading into an immutable telemetry sample
    pub fn into_sample(self, captured_at: i64) -> TelemetrySample {
        TelemetrySample::new(self.motion, self.light, self.temperature, captured_at)
    }
}

/// Payload of a `tamperAlert` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperPayload {
    /// Alert type tag; devices that omit it mean "tamper"
    #[serde(rename = "type", default = "default_tamper_kind")]
    pub kind: String,
    /// Free-form detail supplied by the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn default_tamper_kind() -> String {
    "tamper".to_string()
}

impl Default for TamperPayload {
    fn default() -> Self {
        Self {
            kind: default_tamper_kind(),
            detail: None,
        }
    }
}

/// Payload of a `securityUpdate` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityUpdate {
    /// Raw security level; clamped into [0, 100] by the channel
    pub level: i64,
}

/// An outbound control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundCommand {
    /// Ask the device to simulate a tamper event
    #[serde(rename = "simulateTamper")]
    SimulateTamper {
        /// Device the simulation targets
        device_id: DeviceId,
    },
}

impl OutboundCommand {
    /// Build a tamper simulation command for the given device
    pub fn simulate_tamper(device_id: DeviceId) -> Self {
        Self::SimulateTamper { device_id }
    }

    /// Encode the command as a wire frame
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| VigilError::internal(e.to_string()))
    }
}

/// Decode an inbound text frame
pub fn decode(text: &str) -> Result<InboundFrame> {
    serde_json::from_str(text).map_err(|e| VigilError::malformed_frame(e.to_string()))
}
