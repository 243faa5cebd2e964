//! Market collaborator contracts
//!
//! The decision core never computes indicators itself. Favorability and
//! volatility/trend readings are supplied by whatever owns the market data,
//! behind these traits. Lookups are expected to be fast and in-memory.

use serde::{Deserialize, Serialize};

/// Discrete market regime classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    #[default]
    Normal,
}

impl MarketRegime {
    /// Sizing multiplier for the regime
    pub fn size_factor(self) -> f64 {
        match self {
            MarketRegime::Trending => 1.2,
            MarketRegime::Ranging => 0.8,
            MarketRegime::Volatile => 0.6,
            MarketRegime::Normal => 1.0,
        }
    }
}

/// Verdict of a market favorability check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorability {
    pub is_favorable: bool,
    pub confidence: f64,
    pub reason: String,
}

impl Favorability {
    pub fn favorable(confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            is_favorable: true,
            confidence,
            reason: reason.into(),
        }
    }

    pub fn unfavorable(reason: impl Into<String>) -> Self {
        Self {
            is_favorable: false,
            confidence: 0.0,
            reason: reason.into(),
        }
    }
}

/// Market favorability oracle
pub trait MarketFavorability: Send + Sync {
    fn check(&self, asset: &str) -> Favorability;
}

/// Volatility and trend oracle
pub trait MarketConditions: Send + Sync {
    fn volatility(&self, asset: &str) -> f64;
    fn baseline_volatility(&self, asset: &str) -> f64;
    /// 0.0 (no trend) to 1.0+ (strong trend)
    fn trend_strength(&self, asset: &str) -> f64;
    fn regime(&self, asset: &str) -> MarketRegime;
}

/// Fixed answers for every asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticMarketView {
    pub favorable: bool,
    pub favorability_confidence: f64,
    pub reason: String,
    pub volatility: f64,
    pub baseline_volatility: f64,
    pub trend_strength: f64,
    pub regime: MarketRegime,
}

impl Default for StaticMarketView {
    fn default() -> Self {
        Self {
            favorable: true,
            favorability_confidence: 0.8,
            reason: "Static market view".to_string(),
            volatility: 0.002,
            baseline_volatility: 0.002,
            trend_strength: 1.0,
            regime: MarketRegime::Normal,
        }
    }
}

impl StaticMarketView {
    pub fn unfavorable(reason: &str) -> Self {
        Self {
            favorable: false,
            favorability_confidence: 0.0,
            reason: reason.to_string(),
            ..Default::default()
        }
    }
}

impl MarketFavorability for StaticMarketView {
    fn check(&self, _asset: &str) -> Favorability {
        if self.favorable {
            Favorability::favorable(self.favorability_confidence, self.reason.clone())
        } else {
            Favorability::unfavorable(self.reason.clone())
        }
    }
}

impl MarketConditions for StaticMarketView {
    fn volatility(&self, _asset: &str) -> f64 {
        self.volatility
    }

    fn baseline_volatility(&self, _asset: &str) -> f64 {
        self.baseline_volatility
    }

    fn trend_strength(&self, _asset: &str) -> f64 {
        self.trend_strength
    }

    fn regime(&self, _asset: &str) -> MarketRegime {
        self.regime
    }
}
