//! Portfolio & Risk
//!
//! The trade ledger with its windowed statistics, and the risk-adjusted
//! position sizer that reads those statistics back to scale new positions
//! against a portfolio-wide risk budget.

mod config;
mod ledger;
mod sizer;
mod stats;

pub use crate::config::{
    create_config_template, load_config, load_layered, save_config, ConfigError, RiskParameters, ENV_PREFIX,
};
pub use crate::ledger::TradeLedger;
pub use crate::sizer::{PositionSizer, RiskState, SmoothedFactor};
pub use crate::stats::{compute_stats, in_window, max_drawdown};
