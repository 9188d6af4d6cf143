//! Telemetry samples and the device security level
//!
//! Samples are immutable once produced and ephemeral: they live only in the
//! rolling window until evicted, except for the one sample frozen into a
//! final snapshot at capture time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-axis motion reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionVector {
    /// X axis acceleration
    pub x: f64,
    /// Y axis acceleration
    pub y: f64,
    /// Z axis acceleration
    pub z: f64,
}

impl MotionVector {
    /// Create a motion vector
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One sensor reading from a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// Motion reading
    pub motion: MotionVector,
    /// Light level in lux
    pub light: f64,
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Epoch milliseconds at which the sample was captured
    pub captured_at: i64,
}

impl TelemetrySample {
    /// Create a sample captured at the given time
    pub fn new(motion: MotionVector, light: f64, temperature: f64, captured_at: i64) -> Self {
        Self {
            motion,
            light,
            temperature,
            captured_at,
        }
    }

    /// The all-zero fallback sample, used when a tamper signal arrives
    /// before any telemetry has been observed
    pub fn zeroed(captured_at: i64) -> Self {
        Self {
            motion: MotionVector::default(),
            light: 0.0,
            temperature: 0.0,
            captured_at,
        }
    }
}

/// Device security level, 0 (vulnerable) to 100 (secure)
///
/// Mutated only by inbound `securityUpdate` events; any raw value is
/// clamped into range at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// Clamp a raw wire value into [0, 100]
    pub fn from_raw(raw: i64) -> Self {
        Self(raw.clamp(0, 100) as u8)
    }

    /// Get the level as a percentage
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self(100)
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_level_clamps() {
        assert_eq!(SecurityLevel::from_raw(-5).value(), 0);
        assert_eq!(SecurityLevel::from_raw(0).value(), 0);
        assert_eq!(SecurityLevel::from_raw(42).value(), 42);
        assert_eq!(SecurityLevel::from_raw(100).value(), 100);
        assert_eq!(SecurityLevel::from_raw(1_000).value(), 100);
    }

    #[test]
    fn test_zeroed_sample() {
        let sample = TelemetrySample::zeroed(7);
        assert_eq!(sample.motion, MotionVector::default());
        assert_eq!(sample.light, 0.0);
        assert_eq!(sample.temperature, 0.0);
        assert_eq!(sample.captured_at, 7);
    }
}
