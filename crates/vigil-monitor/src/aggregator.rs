//! Bounded rolling window of recent telemetry samples
//!
//! Display/aggregation only; nothing here persists. The window belongs to
//! exactly one device session and is cleared on device switch, so samples
//! from different devices never mix.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use vigil_core::TelemetrySample;

/// Configuration for the telemetry window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Maximum number of retained samples
    pub window_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_capacity: 50,
        }
    }
}

/// FIFO-evicted window of the most recent samples for one device
#[derive(Debug)]
pub struct TelemetryAggregator {
    window: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetryAggregator {
    /// Create an empty window
    pub fn new(config: AggregatorConfig) -> Self {
        let capacity = config.window_capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a sample, evicting the oldest when the window is full
    pub fn push(&mut self, sample: TelemetrySample) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    /// The most recent sample, if any has been observed
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.window.back()
    }

    /// The window contents in arrival order
    pub fn history(&self) -> Vec<TelemetrySample> {
        self.window.iter().copied().collect()
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether no sample has been retained
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Drop all samples; used on device switch
    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}
