//! Data quality thresholds

use serde::{Deserialize, Serialize};

/// Thresholds for every data quality check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Number of closes (current included) inspected for a frozen feed
    #[serde(default = "default_frozen_window")]
    pub frozen_window: usize,

    /// Absolute price band within which the window counts as frozen
    #[serde(default = "default_frozen_epsilon")]
    pub frozen_epsilon: f64,

    /// How far in the future a timestamp may lie (seconds)
    #[serde(default = "default_future_tolerance_secs")]
    pub future_tolerance_secs: i64,

    /// Largest accepted gap since the previous accepted timestamp (seconds)
    #[serde(default = "default_max_timestamp_gap_secs")]
    pub max_timestamp_gap_secs: i64,

    /// Number of accepted volumes in the weighted statistics
    #[serde(default = "default_volume_window")]
    pub volume_window: usize,

    /// Weight decay per step back in time
    #[serde(default = "default_volume_decay")]
    pub volume_decay: f64,

    /// |z| above which volume is abnormal
    #[serde(default = "default_volume_z_threshold")]
    pub volume_z_threshold: f64,

    /// |z| above which the fixed aggressive correction applies
    #[serde(default = "default_severe_z_threshold")]
    pub severe_z_threshold: f64,

    /// Numerator of the dynamic volume correction
    #[serde(default = "default_correction_factor")]
    pub correction_factor: f64,

    /// Minimum tick count for a valid bar
    #[serde(default = "default_min_tick_count")]
    pub min_tick_count: u64,

    /// Price gap threshold; order book spreads above twice this are anomalous
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,

    /// Anomaly weight sum at which severity becomes high
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: f64,

    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Capacity of the trailing price/volume/timestamp buffers
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            frozen_window: default_frozen_window(),
            frozen_epsilon: default_frozen_epsilon(),
            future_tolerance_secs: default_future_tolerance_secs(),
            max_timestamp_gap_secs: default_max_timestamp_gap_secs(),
            volume_window: default_volume_window(),
            volume_decay: default_volume_decay(),
            volume_z_threshold: default_volume_z_threshold(),
            severe_z_threshold: default_severe_z_threshold(),
            correction_factor: default_correction_factor(),
            min_tick_count: default_min_tick_count(),
            gap_threshold: default_gap_threshold(),
            severity_threshold: default_severity_threshold(),
            base_confidence: default_base_confidence(),
            min_confidence: default_min_confidence(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_frozen_window() -> usize {
    5
}

fn default_frozen_epsilon() -> f64 {
    0.0001
}

fn default_future_tolerance_secs() -> i64 {
    60
}

fn default_max_timestamp_gap_secs() -> i64 {
    300
}

fn default_volume_window() -> usize {
    10
}

fn default_volume_decay() -> f64 {
    0.9
}

fn default_volume_z_threshold() -> f64 {
    3.0
}

fn default_severe_z_threshold() -> f64 {
    5.0
}

fn default_correction_factor() -> f64 {
    0.5
}

fn default_min_tick_count() -> u64 {
    100
}

fn default_gap_threshold() -> f64 {
    0.0020 // 20 pips
}

fn default_severity_threshold() -> f64 {
    4.0
}

fn default_base_confidence() -> f64 {
    0.9
}

fn default_min_confidence() -> f64 {
    0.2
}

fn default_history_limit() -> usize {
    100
}
