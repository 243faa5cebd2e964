//! Risk management configuration

use common::StatsWindow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides. Keys follow the
/// loaded type's shape: `DECISION_CORE__MAX_TOTAL_RISK=0.08` for [`load_config`],
/// `DECISION_CORE__RISK__MAX_TOTAL_RISK=0.08` for a sectioned config
pub const ENV_PREFIX: &str = "DECISION_CORE";

/// Position sizing and risk budget parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Size before any factor is applied
    #[serde(default = "default_base_position_size")]
    pub base_position_size: f64,

    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,

    #[serde(default = "default_min_position_size")]
    pub min_position_size: f64,

    /// Risk a single position may commit
    #[serde(default = "default_max_risk_per_trade")]
    pub max_risk_per_trade: f64,

    /// Portfolio-wide risk budget across all open positions
    #[serde(default = "default_max_total_risk")]
    pub max_total_risk: f64,

    /// Minimum time between factor recalculations (in minutes)
    #[serde(default = "default_recalc_cooldown_minutes")]
    pub recalc_cooldown_minutes: i64,

    /// Closed trades required before performance moves the sizing
    #[serde(default = "default_min_sample_trades")]
    pub min_sample_trades: usize,

    /// Trailing window the performance statistics are read over
    #[serde(default = "default_stats_window")]
    pub stats_window: StatsWindow,

    /// Price increment of one pip, used in the position risk estimate
    #[serde(default = "default_pip_size")]
    pub pip_size: f64,

    #[serde(default = "default_enabled")]
    pub drawdown_scaling: bool,

    #[serde(default = "default_enabled")]
    pub volatility_scaling: bool,

    #[serde(default = "default_enabled")]
    pub win_rate_scaling: bool,

    #[serde(default = "default_enabled")]
    pub profit_factor_scaling: bool,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            base_position_size: default_base_position_size(),
            max_position_size: default_max_position_size(),
            min_position_size: default_min_position_size(),
            max_risk_per_trade: default_max_risk_per_trade(),
            max_total_risk: default_max_total_risk(),
            recalc_cooldown_minutes: default_recalc_cooldown_minutes(),
            min_sample_trades: default_min_sample_trades(),
            stats_window: default_stats_window(),
            pip_size: default_pip_size(),
            drawdown_scaling: true,
            volatility_scaling: true,
            win_rate_scaling: true,
            profit_factor_scaling: true,
        }
    }
}

fn default_base_position_size() -> f64 {
    1.0
}

fn default_max_position_size() -> f64 {
    2.0
}

fn default_min_position_size() -> f64 {
    0.1
}

fn default_max_risk_per_trade() -> f64 {
    0.02 // 2% of capital
}

fn default_max_total_risk() -> f64 {
    0.06 // 6% of capital
}

fn default_recalc_cooldown_minutes() -> i64 {
    15
}

fn default_min_sample_trades() -> usize {
    10
}

fn default_stats_window() -> StatsWindow {
    StatsWindow::Week
}

fn default_pip_size() -> f64 {
    0.0001
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Load a configuration file, then apply `DECISION_CORE__*` environment overrides
pub fn load_layered<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Load risk parameters from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<RiskParameters, ConfigError> {
    load_layered(path)
}

/// Save risk parameters to a TOML file
pub fn save_config(params: &RiskParameters, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(params)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Write a template configuration file with every default spelled out
pub fn create_config_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    save_config(&RiskParameters::default(), path)
}
