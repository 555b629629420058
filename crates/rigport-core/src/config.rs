//! [`SourceConfig`] – numeric knobs of a sensor source.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_rotation_tolerance() -> f64 {
    1e-6
}

fn default_translation_tolerance() -> f64 {
    1e-4
}

fn default_time_offset_tolerance_ns() -> u64 {
    1
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

/// Tolerances used to validate calibration cycles, and the hardware
/// handshake budget.  Every field has a default, so an empty TOML table is a
/// valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Largest rotation residual (rad) tolerated around a transform cycle.
    #[serde(default = "default_rotation_tolerance")]
    pub rotation_tolerance: f64,
    /// Largest translation residual (m) tolerated around a transform cycle.
    #[serde(default = "default_translation_tolerance")]
    pub translation_tolerance: f64,
    /// Largest |sum of offsets| (ns) tolerated around a clock cycle.
    #[serde(default = "default_time_offset_tolerance_ns")]
    pub time_offset_tolerance_ns: u64,
    /// Budget for `connect` and `start_streaming` on the device.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            rotation_tolerance: default_rotation_tolerance(),
            translation_tolerance: default_translation_tolerance(),
            time_offset_tolerance_ns: default_time_offset_tolerance_ns(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
