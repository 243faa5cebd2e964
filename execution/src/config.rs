//! Execution and top-level decision core configuration

use data_quality::QualityConfig;
use portfolio_risk::{load_layered, ConfigError, RiskParameters};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Admission rules for new trades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParameters {
    /// Minimum signal confidence (0.0 to 1.0)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,

    /// Minimum wall-clock spacing between trades (in minutes)
    #[serde(default = "default_min_minutes_between_trades")]
    pub min_minutes_between_trades: i64,

    /// Consecutive losses that halt trading while recovery mode is enabled
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    #[serde(default = "default_true")]
    pub recovery_mode_enabled: bool,

    /// Minimum data quality confidence for an anomalous payload
    #[serde(default = "default_edge_case_min_confidence")]
    pub edge_case_min_confidence: f64,

    /// Reject outright when data quality severity is high
    #[serde(default = "default_true")]
    pub reject_high_severity: bool,

    /// Apply proposed data corrections before sizing
    #[serde(default = "default_true")]
    pub enable_data_correction: bool,

    /// Value of one pip per unit of position size
    #[serde(default = "default_pip_value")]
    pub pip_value: f64,
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_daily_trades: default_max_daily_trades(),
            min_minutes_between_trades: default_min_minutes_between_trades(),
            recovery_threshold: default_recovery_threshold(),
            recovery_mode_enabled: true,
            edge_case_min_confidence: default_edge_case_min_confidence(),
            reject_high_severity: true,
            enable_data_correction: true,
            pip_value: default_pip_value(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_max_daily_trades() -> u32 {
    10
}

fn default_min_minutes_between_trades() -> i64 {
    15
}

fn default_recovery_threshold() -> u32 {
    3
}

fn default_edge_case_min_confidence() -> f64 {
    0.7
}

fn default_pip_value() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Everything the decision core needs at construction time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionCoreConfig {
    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub risk: RiskParameters,

    #[serde(default)]
    pub execution: ExecutionParameters,
}

/// Load configuration from a TOML file with `DECISION_CORE__*` overrides,
/// e.g. `DECISION_CORE__EXECUTION__MAX_DAILY_TRADES=5`
pub fn load_config(path: impl AsRef<Path>) -> Result<DecisionCoreConfig, ConfigError> {
    load_layered(path)
}

/// Save configuration to a TOML file
pub fn save_config(config: &DecisionCoreConfig, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let template = "# Decision Core Configuration
# Every key is optional; missing keys take their defaults.

[quality]
# Closes (current included) checked for a frozen feed
frozen_window = 5
frozen_epsilon = 0.0001

# Timestamp rules (seconds)
future_tolerance_secs = 60
max_timestamp_gap_secs = 300

# Volume z-score thresholds
volume_z_threshold = 3.0
severe_z_threshold = 5.0
correction_factor = 0.5

min_tick_count = 100
gap_threshold = 0.0020
min_confidence = 0.2

[risk]
base_position_size = 1.0
min_position_size = 0.1
max_position_size = 2.0

# Fractions of capital
max_risk_per_trade = 0.02
max_total_risk = 0.06

recalc_cooldown_minutes = 15
min_sample_trades = 10
stats_window = \"week\"
pip_size = 0.0001

[execution]
min_confidence = 0.6
max_daily_trades = 10
min_minutes_between_trades = 15

# Halt trading after this many consecutive losses
recovery_threshold = 3
recovery_mode_enabled = true

# Data quality policy
edge_case_min_confidence = 0.7
reject_high_severity = true
enable_data_correction = true

pip_value = 1.0
";

    std::fs::write(path, template)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}-{}.toml", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_default_config() {
        let config = DecisionCoreConfig::default();
        assert_eq!(config.execution.min_confidence, 0.6);
        assert_eq!(config.execution.recovery_threshold, 3);
        assert!(config.execution.reject_high_severity);
        assert_eq!(config.risk.max_total_risk, 0.06);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DecisionCoreConfig = toml::from_str(
            r#"
            [execution]
            max_daily_trades = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.execution.max_daily_trades, 15);
        assert_eq!(config.execution.min_minutes_between_trades, 15);
        assert_eq!(config.quality.min_tick_count, 100);
    }

    #[test]
    fn test_template_loads() {
        let path = temp_path("decision-core-template");
        create_config_template(&path).unwrap();
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.execution.max_daily_trades, 10);
        assert_eq!(config.risk.max_risk_per_trade, 0.02);
        assert_eq!(config.quality.frozen_window, 5);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("decision-core");
        let mut config = DecisionCoreConfig::default();
        config.execution.recovery_mode_enabled = false;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(!loaded.execution.recovery_mode_enabled);
    }
}
