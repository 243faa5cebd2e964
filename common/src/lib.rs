//! Shared domain types for the trading decision core.
//!
//! Everything the pipeline components exchange lives here: candidate
//! decisions, trades, statistics records and the collaborator traits
//! (market oracles, trailing statistics, clocks).

pub mod clock;
pub mod decision;
pub mod market;
pub mod trade;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{BookLevel, CandidateDecision, Direction, Indicators};
pub use market::{Favorability, MarketConditions, MarketFavorability, MarketRegime, StaticMarketView};
pub use trade::{PipConvention, StatsSource, StatsWindow, Trade, TradeStats, TradeStatus};

pub use chrono::{DateTime, Duration, Utc};
pub use uuid::Uuid;
