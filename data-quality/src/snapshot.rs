//! The slice of a candidate decision the quality checks inspect

use chrono::{DateTime, Utc};
use common::{BookLevel, CandidateDecision};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
    pub tick_count: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl MarketSnapshot {
    /// Project the market-context part of a decision
    pub fn from_decision(decision: &CandidateDecision) -> Self {
        let indicators = &decision.indicators;
        Self {
            timestamp: decision.timestamp,
            close: indicators.close,
            volume: indicators.volume,
            tick_count: indicators.tick_count,
            bids: indicators.bids.clone(),
            asks: indicators.asks.clone(),
        }
    }

    /// Write these values back into a decision
    pub fn apply_to(&self, decision: &mut CandidateDecision) {
        decision.timestamp = self.timestamp;
        let indicators = &mut decision.indicators;
        indicators.close = self.close;
        indicators.volume = self.volume;
        indicators.tick_count = self.tick_count;
        indicators.bids = self.bids.clone();
        indicators.asks = self.asks.clone();
    }

    pub fn has_book(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Fails on any NaN or infinite number
    pub(crate) fn ensure_finite(&self) -> anyhow::Result<()> {
        if !self.close.is_finite() {
            anyhow::bail!("Non-finite close price: {}", self.close);
        }
        if !self.volume.is_finite() {
            anyhow::bail!("Non-finite volume: {}", self.volume);
        }
        let book = self.bids.iter().chain(self.asks.iter());
        for level in book {
            if !level.price.is_finite() || !level.size.is_finite() {
                anyhow::bail!("Non-finite order book level: {:?}", level);
            }
        }
        Ok(())
    }
}
