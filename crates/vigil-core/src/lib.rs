//! # Vigil Core - Foundation Types
//!
//! **Purpose**: Define the domain types, identifiers, and unified error type
//! shared by every Vigil crate.
//!
//! This crate is the foundation layer: pure synchronous domain logic with no
//! async runtime, no I/O, and no transport or storage concerns.
//!
//! ## Core Concepts
//!
//! - **Device records**: read-only cached copies of registry-owned devices
//! - **Telemetry samples**: immutable sensor readings (motion, light,
//!   temperature) stamped at capture time
//! - **Tamper alerts**: append-only records, optionally referencing a
//!   persisted final snapshot
//! - **Final snapshots**: the last known sensor state, serialized and stored
//!   under a write-once key
//!
//! ## What's NOT in this crate
//!
//! - Wire frame parsing (belongs in `vigil-transport`)
//! - Store traits and implementations (belong in `vigil-store`)
//! - Capture sequencing and session orchestration (belong in `vigil-monitor`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Tamper alert and final snapshot records
pub mod alert;

/// Device records and status
pub mod device;

/// Unified error type for all Vigil operations
pub mod error;

/// Core identifier newtypes
pub mod identifiers;

/// Telemetry sample and security level types
pub mod telemetry;

/// Wall-clock helpers
pub mod time;

pub use alert::{FinalSnapshot, TamperAlert};
pub use device::{Device, DeviceStatus};
pub use error::{Result, VigilError};
pub use identifiers::{AlertId, DeviceId, SnapshotKey};
pub use telemetry::{MotionVector, SecurityLevel, TelemetrySample};
pub use time::now_millis;
