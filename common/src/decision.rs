//! Candidate decisions as received from the signal producer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for buys, -1 for sells
    pub fn sign(self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            other => Err(anyhow::anyhow!("Unknown direction: {}", other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price level of an order book ladder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Indicator bag attached to a candidate decision.
///
/// The keys the decision core depends on are typed fields; anything else
/// the producer attaches is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Indicators {
    pub close: f64,
    pub volume: f64,
    pub tick_count: u64,
    /// Best bid first, non-increasing prices
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    /// Best ask first, non-decreasing prices
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    pub entry_price: f64,
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl Indicators {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn has_book(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

/// A trading signal as proposed by the strategy layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDecision {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub asset: String,
    /// 0.0 to 1.0
    pub confidence: f64,
    #[serde(default)]
    pub expiry_minutes: Option<u32>,
    pub indicators: Indicators,
}
