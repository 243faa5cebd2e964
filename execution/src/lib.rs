//! Execution Gate & Trade Lifecycle
//!
//! Turns candidate decisions into trades. Each signal is checked by the data
//! quality gate, validated against admission rules, sized by the position
//! sizer and recorded in the ledger. Closing a trade feeds its result back
//! into the statistics the sizer reads.

mod config;
mod executor;
mod rejection;
mod shared;

pub use config::{create_config_template, load_config, save_config, DecisionCoreConfig, ExecutionParameters};
pub use executor::TradeExecutor;
pub use rejection::Rejection;
pub use shared::SharedTradeExecutor;
