//! # Vigil Monitor - Ingestion and Tamper-Capture Pipeline
//!
//! The business layer over `vigil-transport` and `vigil-store`:
//!
//! - **DeviceRegistryWatcher**: live device-list subscription
//! - **TelemetryAggregator**: bounded rolling window of recent samples
//! - **TamperCaptureCoordinator**: the capture-and-persist sequence,
//!   executed at most once per tamper episode per device
//! - **AlertFeed**: per-device alert subscription
//! - **SessionController**: active-device selection, simulation-mode
//!   gating, and atomic teardown/reopen of per-device resources
//!
//! The concurrency model is one logical loop per device session: every
//! channel event is processed in arrival order, and the only cross-task
//! state is the capture in-flight guard and the stores, whose append/put
//! operations are atomic at the storage boundary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Bounded rolling window of telemetry samples
pub mod aggregator;

/// Tamper capture sequencing
pub mod capture;

/// Per-device alert subscriptions
pub mod feed;

/// Session orchestration
pub mod session;

/// Device registry subscriptions
pub mod watcher;

pub use aggregator::{AggregatorConfig, TelemetryAggregator};
pub use capture::{CaptureOutcome, TamperCaptureCoordinator};
pub use feed::{AlertFeed, AlertSubscription};
pub use session::{SessionConfig, SessionController, SessionEvent};
pub use watcher::{DeviceRegistryWatcher, RegistrySubscription};
