//! Risk-adjusted position sizing
//!
//! Sizes are a base size scaled by four smoothed factors and the signal
//! strength, clamped to configured bounds and then fitted into the remaining
//! portfolio risk budget.

use crate::config::RiskParameters;
use chrono::{DateTime, Duration, Utc};
use common::{Clock, MarketConditions, StatsSource, SystemClock, TradeStats};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Weight kept from the previous factor value on every blend
const SMOOTHING_KEEP: f64 = 0.7;

/// Tolerance for floating point comparisons against the risk budget
const RISK_EPSILON: f64 = 1e-12;

/// Exponentially smoothed multiplier confined to `[floor, ceiling]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SmoothedFactor {
    pub value: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl SmoothedFactor {
    /// Neutral factor (1.0) with the given bounds
    pub fn new(floor: f64, ceiling: f64) -> Self {
        Self {
            value: 1.0f64.clamp(floor, ceiling),
            floor,
            ceiling,
        }
    }

    /// `value = clamp(0.7 * value + 0.3 * new)`. Non-finite readings are ignored.
    pub fn blend(&mut self, new_value: f64) -> f64 {
        if !new_value.is_finite() {
            debug!(new_value, "Ignoring non-finite factor reading");
            return self.value;
        }
        let blended = SMOOTHING_KEEP * self.value + (1.0 - SMOOTHING_KEEP) * new_value;
        self.value = blended.clamp(self.floor, self.ceiling);
        self.value
    }
}

/// Committed risk per asset plus the sizing factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    /// Committed risk fraction by asset
    pub risk_per_symbol: HashMap<String, f64>,

    /// Always the sum of `risk_per_symbol`
    pub current_total_risk: f64,

    pub performance: SmoothedFactor,
    pub market: SmoothedFactor,
    pub drawdown: SmoothedFactor,
    pub volatility: SmoothedFactor,

    /// `None` until the first recalculation
    pub last_recalc: Option<DateTime<Utc>>,
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            risk_per_symbol: HashMap::new(),
            current_total_risk: 0.0,
            performance: SmoothedFactor::new(0.1, 2.0),
            market: SmoothedFactor::new(0.3, 1.8),
            drawdown: SmoothedFactor::new(0.5, 1.0),
            volatility: SmoothedFactor::new(0.1, 1.2),
            last_recalc: None,
        }
    }
}

impl RiskState {
    /// Product of the four factors
    pub fn combined_factor(&self) -> f64 {
        self.performance.value * self.market.value * self.drawdown.value * self.volatility.value
    }

    /// Risk committed by every asset except `asset`
    pub fn risk_excluding(&self, asset: &str) -> f64 {
        self.current_total_risk - self.risk_per_symbol.get(asset).copied().unwrap_or(0.0)
    }

    /// Whether the stored total matches the per-asset entries
    pub fn is_consistent(&self) -> bool {
        let sum: f64 = self.risk_per_symbol.values().sum();
        (sum - self.current_total_risk).abs() <= RISK_EPSILON
    }

    fn recompute_total(&mut self) {
        self.current_total_risk = self.risk_per_symbol.values().sum();
    }
}

/// Position sizer owning the portfolio risk state
pub struct PositionSizer {
    params: RiskParameters,
    state: RiskState,
    clock: Arc<dyn Clock>,
}

impl PositionSizer {
    pub fn new(params: RiskParameters) -> Self {
        Self::with_clock(params, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(params: RiskParameters, clock: Arc<dyn Clock>) -> Self {
        Self {
            params,
            state: RiskState::default(),
            clock,
        }
    }

    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    pub fn risk_state(&self) -> &RiskState {
        &self.state
    }

    /// Size a position for `asset`.
    ///
    /// Returns 0.0 when the risk budget has no room for at least the minimum
    /// size. Internal faults fall back to the minimum position size.
    pub fn calculate_position_size(
        &mut self,
        asset: &str,
        signal_strength: f64,
        entry_price: f64,
        stats: &dyn StatsSource,
        market: &dyn MarketConditions,
    ) -> f64 {
        match self.try_size(asset, signal_strength, entry_price, stats, market) {
            Ok(size) => size,
            Err(e) => {
                error!(asset = %asset, error = %e, "Position sizing failed, using minimum size");
                self.params.min_position_size
            }
        }
    }

    fn try_size(
        &mut self,
        asset: &str,
        signal_strength: f64,
        entry_price: f64,
        stats: &dyn StatsSource,
        market: &dyn MarketConditions,
    ) -> anyhow::Result<f64> {
        if !signal_strength.is_finite() || signal_strength < 0.0 {
            anyhow::bail!("Invalid signal strength {}", signal_strength);
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            anyhow::bail!("Invalid entry price {}", entry_price);
        }

        self.maybe_recalculate(asset, stats, market);

        let raw = self.params.base_position_size * self.state.combined_factor() * signal_strength;
        let clamped = raw.clamp(self.params.min_position_size, self.params.max_position_size);
        let size = round_size(clamped, RoundingStrategy::MidpointAwayFromZero)?;

        let fitted = self.fit_to_budget(asset, size, entry_price, market)?;

        debug!(
            asset = %asset,
            raw_size = raw,
            size = fitted,
            factor = self.state.combined_factor(),
            "Position size calculated"
        );

        Ok(fitted)
    }

    /// Shrink `size` into whatever is left of the per-trade and total budgets
    fn fit_to_budget(
        &self,
        asset: &str,
        size: f64,
        entry_price: f64,
        market: &dyn MarketConditions,
    ) -> anyhow::Result<f64> {
        let per_unit = self.position_risk(1.0, entry_price, market.volatility(asset))?;
        if per_unit <= 0.0 {
            return Ok(size);
        }

        let remaining = self.params.max_total_risk - self.state.risk_excluding(asset);
        let allowance = remaining.min(self.params.max_risk_per_trade);

        if size * per_unit <= allowance {
            return Ok(size);
        }

        if allowance <= 0.0 {
            warn!(
                asset = %asset,
                current_total_risk = self.state.current_total_risk,
                max_total_risk = self.params.max_total_risk,
                "Risk budget exhausted"
            );
            return Ok(0.0);
        }

        let fitted = round_size(allowance / per_unit, RoundingStrategy::ToZero)?;
        if fitted < self.params.min_position_size {
            warn!(
                asset = %asset,
                fitted_size = fitted,
                min_position_size = self.params.min_position_size,
                "Remaining risk budget below minimum position size"
            );
            return Ok(0.0);
        }

        info!(asset = %asset, requested = size, fitted = fitted, "Position size reduced to fit risk budget");
        Ok(fitted)
    }

    fn maybe_recalculate(&mut self, asset: &str, stats: &dyn StatsSource, market: &dyn MarketConditions) {
        let now = self.clock.now();
        let due = match self.state.last_recalc {
            None => true,
            Some(last) => now - last >= Duration::minutes(self.params.recalc_cooldown_minutes),
        };
        if !due {
            return;
        }

        let trailing = stats.trailing_stats(self.params.stats_window);

        let performance = self.state.performance.blend(self.performance_reading(&trailing));
        let market_factor = self.state.market.blend(market_reading(asset, market));
        let drawdown = self.state.drawdown.blend(self.drawdown_reading(&trailing));
        let volatility = self.state.volatility.blend(self.volatility_reading(asset, market));
        self.state.last_recalc = Some(now);

        info!(
            asset = %asset,
            performance = performance,
            market = market_factor,
            drawdown = drawdown,
            volatility = volatility,
            "Risk factors recalculated"
        );
    }

    fn performance_reading(&self, stats: &TradeStats) -> f64 {
        if stats.total_trades < self.params.min_sample_trades {
            return 1.0;
        }
        let win_rate = if self.params.win_rate_scaling {
            (stats.win_rate * 1.5).min(1.5)
        } else {
            1.0
        };
        let profit_factor = if self.params.profit_factor_scaling {
            stats.profit_factor.min(2.0) / 1.5
        } else {
            1.0
        };
        win_rate * profit_factor
    }

    fn drawdown_reading(&self, stats: &TradeStats) -> f64 {
        if !self.params.drawdown_scaling || stats.max_drawdown <= 0.0 {
            return 1.0;
        }
        (1.0 - stats.max_drawdown / (self.params.max_total_risk * 2.0)).max(0.5)
    }

    fn volatility_reading(&self, asset: &str, market: &dyn MarketConditions) -> f64 {
        if !self.params.volatility_scaling {
            return 1.0;
        }
        let baseline = market.baseline_volatility(asset);
        if baseline <= 0.0 {
            return 1.0;
        }
        let ratio = market.volatility(asset) / baseline;
        if ratio < 1.0 {
            (1.0 + (1.0 - ratio) * 0.2).min(1.2)
        } else {
            1.0 / ratio.max(1.0)
        }
    }

    /// Risk a position of `size` at `price` would commit
    pub fn position_risk(&self, size: f64, price: f64, volatility: f64) -> anyhow::Result<f64> {
        let risk = size * price * self.params.pip_size * volatility;
        if !risk.is_finite() || risk < 0.0 {
            anyhow::bail!(
                "Invalid position risk {} (size {}, price {}, volatility {})",
                risk,
                size,
                price,
                volatility
            );
        }
        Ok(risk)
    }

    /// Whether committing `size` for `asset` keeps both budgets intact
    pub fn can_commit(&self, asset: &str, size: f64, price: f64, market: &dyn MarketConditions) -> bool {
        match self.position_risk(size, price, market.volatility(asset)) {
            Ok(risk) => {
                risk <= self.params.max_risk_per_trade + RISK_EPSILON
                    && self.state.risk_excluding(asset) + risk <= self.params.max_total_risk + RISK_EPSILON
            }
            Err(e) => {
                warn!(asset = %asset, error = %e, "Cannot evaluate position risk");
                false
            }
        }
    }

    /// Record the committed risk for `asset`, replacing any earlier entry
    pub fn update_risk_state(&mut self, asset: &str, size: f64, price: f64, market: &dyn MarketConditions) {
        match self.position_risk(size, price, market.volatility(asset)) {
            Ok(risk) => {
                self.state.risk_per_symbol.insert(asset.to_string(), risk);
                self.state.recompute_total();
                debug!(
                    asset = %asset,
                    risk = risk,
                    current_total_risk = self.state.current_total_risk,
                    "Risk state updated"
                );
            }
            Err(e) => error!(asset = %asset, error = %e, "Risk state not updated"),
        }
    }

    /// Drop the committed risk for `asset`. No-op when absent.
    pub fn release_risk(&mut self, asset: &str) {
        if self.state.risk_per_symbol.remove(asset).is_some() {
            self.state.recompute_total();
            debug!(
                asset = %asset,
                current_total_risk = self.state.current_total_risk,
                "Risk released"
            );
        }
    }
}

fn market_reading(asset: &str, market: &dyn MarketConditions) -> f64 {
    market.trend_strength(asset).clamp(0.5, 1.5) * market.regime(asset).size_factor()
}

/// Round to 2 decimals with the given strategy
fn round_size(size: f64, strategy: RoundingStrategy) -> anyhow::Result<f64> {
    let decimal = Decimal::from_f64(size).ok_or_else(|| anyhow::anyhow!("Size {} is not representable", size))?;
    decimal
        .round_dp_with_strategy(2, strategy)
        .to_f64()
        .ok_or_else(|| anyhow::anyhow!("Rounded size {} is not representable", decimal))
}
