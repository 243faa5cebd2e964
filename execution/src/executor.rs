//! Execution gate and trade lifecycle
//!
//! Every candidate decision runs the same pipeline and stops at the first
//! failing stage: daily reset, data quality, signal validation, admission
//! limits, sizing, then trade construction.

use crate::config::{DecisionCoreConfig, ExecutionParameters};
use crate::rejection::Rejection;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{
    CandidateDecision, Clock, MarketConditions, MarketFavorability, PipConvention, SystemClock, Trade,
};
use data_quality::{DataQualityGate, MarketSnapshot, Severity};
use portfolio_risk::{PositionSizer, TradeLedger};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrates the decision core for one running strategy
pub struct TradeExecutor {
    params: ExecutionParameters,
    gate: DataQualityGate,
    sizer: PositionSizer,
    ledger: TradeLedger,
    favorability: Arc<dyn MarketFavorability>,
    market: Arc<dyn MarketConditions>,
    clock: Arc<dyn Clock>,

    /// Open trade ids and their assets
    active: HashMap<Uuid, String>,

    daily_trade_count: u32,
    last_reset_date: Option<NaiveDate>,
    last_trade_time: Option<DateTime<Utc>>,
    consecutive_losses: u32,
}

impl TradeExecutor {
    pub fn new(
        config: DecisionCoreConfig,
        favorability: Arc<dyn MarketFavorability>,
        market: Arc<dyn MarketConditions>,
    ) -> Self {
        Self::with_clock(config, favorability, market, Arc::new(SystemClock::new()))
    }

    /// Build with an explicit clock shared by every component
    pub fn with_clock(
        config: DecisionCoreConfig,
        favorability: Arc<dyn MarketFavorability>,
        market: Arc<dyn MarketConditions>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pips = PipConvention {
            pip_size: config.risk.pip_size,
            pip_value: config.execution.pip_value,
        };

        info!(
            clock = clock.name(),
            max_daily_trades = config.execution.max_daily_trades,
            max_total_risk = config.risk.max_total_risk,
            "Trade executor initialized"
        );

        Self {
            gate: DataQualityGate::with_clock(config.quality, clock.clone()),
            sizer: PositionSizer::with_clock(config.risk, clock.clone()),
            ledger: TradeLedger::with_clock(pips, clock.clone()),
            params: config.execution,
            favorability,
            market,
            clock,
            active: HashMap::new(),
            daily_trade_count: 0,
            last_reset_date: None,
            last_trade_time: None,
            consecutive_losses: 0,
        }
    }

    /// Run the pipeline, logging the reason when no trade results
    pub fn process_signal(&mut self, decision: CandidateDecision) -> Option<Trade> {
        let asset = decision.asset.clone();
        match self.evaluate(decision) {
            Ok(trade) => Some(trade),
            Err(rejection) => {
                info!(asset = %asset, reason = rejection.code(), "Signal rejected: {}", rejection);
                None
            }
        }
    }

    /// Run the pipeline and return the opened trade or the first rejection
    pub fn evaluate(&mut self, mut decision: CandidateDecision) -> Result<Trade, Rejection> {
        self.reset_daily_if_needed(decision.timestamp.date_naive());

        validate_inputs(&decision)?;

        let corrected = self.check_data_quality(&mut decision)?;
        self.validate_signal(&decision)?;
        self.check_admission()?;

        let entry_price = decision.indicators.entry_price;
        let size = self.sizer.calculate_position_size(
            &decision.asset,
            decision.confidence,
            entry_price,
            &self.ledger,
            self.market.as_ref(),
        );
        if size <= 0.0 {
            return Err(Rejection::NoPositionSize { size });
        }
        if !self.sizer.can_commit(&decision.asset, size, entry_price, self.market.as_ref()) {
            return Err(Rejection::RiskBudget {
                asset: decision.asset.clone(),
                size,
            });
        }

        self.open_trade(&decision, size, corrected)
    }

    fn reset_daily_if_needed(&mut self, date: NaiveDate) {
        if self.last_reset_date == Some(date) {
            return;
        }
        if self.last_reset_date.is_some() {
            info!(
                date = %date,
                previous_count = self.daily_trade_count,
                "Daily trade counter reset"
            );
        }
        self.daily_trade_count = 0;
        self.last_reset_date = Some(date);
    }

    /// Evaluate the market context, apply corrections in place and return
    /// the tags that were corrected
    fn check_data_quality(&mut self, decision: &mut CandidateDecision) -> Result<Vec<String>, Rejection> {
        let snapshot = MarketSnapshot::from_decision(decision);
        let report = self.gate.evaluate(&snapshot);
        let anomalies: Vec<String> = report.tags().into_iter().map(String::from).collect();

        if self.params.reject_high_severity && report.severity == Severity::High {
            return Err(Rejection::DataQualitySeverity {
                severity: report.severity,
                anomalies,
            });
        }

        if report.confidence < self.params.edge_case_min_confidence {
            return Err(Rejection::DataQualityConfidence {
                confidence: report.confidence,
                minimum: self.params.edge_case_min_confidence,
                anomalies,
            });
        }

        let mut corrected = Vec::new();
        let accepted = match &report.corrected {
            Some(fixed) if self.params.enable_data_correction => {
                fixed.apply_to(decision);
                corrected = report.corrections.iter().map(|k| k.tag().to_string()).collect();
                info!(
                    asset = %decision.asset,
                    corrections = ?corrected,
                    confidence = report.confidence,
                    "Applied data corrections"
                );
                fixed
            }
            _ => &report.original,
        };

        if !report.is_clean() {
            debug!(asset = %decision.asset, anomalies = ?anomalies, "Proceeding despite anomalies");
        }

        self.gate.accept(accepted);
        Ok(corrected)
    }

    fn validate_signal(&self, decision: &CandidateDecision) -> Result<(), Rejection> {
        if decision.confidence < self.params.min_confidence {
            return Err(Rejection::LowConfidence {
                confidence: decision.confidence,
                minimum: self.params.min_confidence,
            });
        }

        let verdict = self.favorability.check(&decision.asset);
        if !verdict.is_favorable {
            return Err(Rejection::UnfavorableMarket { reason: verdict.reason });
        }

        if self.has_open_trade(&decision.asset) {
            return Err(Rejection::DuplicateAsset {
                asset: decision.asset.clone(),
            });
        }

        Ok(())
    }

    fn check_admission(&self) -> Result<(), Rejection> {
        if self.daily_trade_count >= self.params.max_daily_trades {
            return Err(Rejection::DailyLimit {
                count: self.daily_trade_count,
                limit: self.params.max_daily_trades,
            });
        }

        if let Some(last) = self.last_trade_time {
            let elapsed = self.clock.now() - last;
            if elapsed < Duration::minutes(self.params.min_minutes_between_trades) {
                return Err(Rejection::TooSoon {
                    elapsed_minutes: elapsed.num_minutes(),
                    minimum: self.params.min_minutes_between_trades,
                });
            }
        }

        if self.in_recovery_mode() {
            return Err(Rejection::RecoveryMode {
                consecutive_losses: self.consecutive_losses,
                threshold: self.params.recovery_threshold,
            });
        }

        Ok(())
    }

    fn open_trade(
        &mut self,
        decision: &CandidateDecision,
        size: f64,
        corrected: Vec<String>,
    ) -> Result<Trade, Rejection> {
        let now = self.clock.now();
        let mut trade = Trade::open(
            &decision.asset,
            decision.direction,
            decision.indicators.entry_price,
            decision.timestamp,
            size,
        );
        trade.stop_loss = decision.indicators.extra.get("stop_loss").copied();
        trade.take_profit = decision.indicators.extra.get("take_profit").copied();

        trade.tags.push(format!("confidence_{:.2}", decision.confidence));
        trade.tags.extend(corrected);
        trade.metadata = json!({
            "processed_at": now,
            "expiry_minutes": decision.expiry_minutes,
            "indicators": serde_json::to_value(&decision.indicators).unwrap_or_default(),
        });

        if !self.ledger.open(trade.clone()) {
            return Err(Rejection::Ledger {
                asset: decision.asset.clone(),
            });
        }

        self.active.insert(trade.id, trade.asset.clone());
        self.sizer
            .update_risk_state(&trade.asset, size, trade.entry_price, self.market.as_ref());
        self.last_trade_time = Some(now);
        self.daily_trade_count += 1;

        info!(
            trade_id = %trade.id,
            asset = %trade.asset,
            direction = %trade.direction,
            entry_price = trade.entry_price,
            size = size,
            daily_count = self.daily_trade_count,
            "Trade executed"
        );

        Ok(trade)
    }

    /// Close an active trade. Unknown or already closed ids are a no-op.
    pub fn close_trade(&mut self, id: Uuid, exit_price: f64, exit_time: DateTime<Utc>) -> Option<Trade> {
        if !self.active.contains_key(&id) {
            debug!(trade_id = %id, "Close requested for inactive trade");
            return None;
        }
        if !exit_price.is_finite() || exit_price <= 0.0 {
            warn!(trade_id = %id, exit_price = exit_price, "Refusing to close with invalid exit price");
            return None;
        }

        let asset = self.active.remove(&id)?;
        self.sizer.release_risk(&asset);

        let Some(trade) = self.ledger.close(id, exit_price, exit_time) else {
            warn!(trade_id = %id, asset = %asset, "Active trade missing from ledger");
            return None;
        };

        if trade.realized_pnl() < 0.0 {
            self.consecutive_losses += 1;
            if self.in_recovery_mode() {
                warn!(
                    consecutive_losses = self.consecutive_losses,
                    threshold = self.params.recovery_threshold,
                    "Recovery mode active, new trades halted"
                );
            }
        } else {
            if self.in_recovery_mode() {
                info!("Winning trade closed, leaving recovery mode");
            }
            self.consecutive_losses = 0;
        }

        Some(trade)
    }

    pub fn has_open_trade(&self, asset: &str) -> bool {
        self.active.values().any(|a| a == asset)
    }

    pub fn in_recovery_mode(&self) -> bool {
        self.params.recovery_mode_enabled && self.consecutive_losses >= self.params.recovery_threshold
    }

    /// Trades currently open
    pub fn active_trades(&self) -> Vec<&Trade> {
        self.active.keys().filter_map(|id| self.ledger.get(id)).collect()
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn daily_trade_count(&self) -> u32 {
        self.daily_trade_count
    }

    pub fn last_trade_time(&self) -> Option<DateTime<Utc>> {
        self.last_trade_time
    }

    pub fn params(&self) -> &ExecutionParameters {
        &self.params
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    pub fn gate(&self) -> &DataQualityGate {
        &self.gate
    }
}

/// Reject signals whose numbers cannot be reasoned about
fn validate_inputs(decision: &CandidateDecision) -> Result<(), Rejection> {
    if !decision.confidence.is_finite() {
        return Err(Rejection::InvalidSignal {
            reason: format!("confidence {}", decision.confidence),
        });
    }
    let entry_price = decision.indicators.entry_price;
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return Err(Rejection::InvalidSignal {
            reason: format!("entry price {}", entry_price),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{BookLevel, Direction, Indicators, ManualClock, StaticMarketView};
    use std::collections::BTreeMap;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn signal(asset: &str, close: f64, at: DateTime<Utc>) -> CandidateDecision {
        CandidateDecision {
            timestamp: at,
            direction: Direction::Buy,
            asset: asset.to_string(),
            confidence: 0.8,
            expiry_minutes: Some(5),
            indicators: Indicators {
                close,
                volume: 1000.0,
                tick_count: 150,
                bids: vec![BookLevel::new(close - 0.0001, 1.0)],
                asks: vec![BookLevel::new(close + 0.0001, 1.0)],
                entry_price: close,
                extra: BTreeMap::new(),
            },
        }
    }

    fn executor_with(view: StaticMarketView) -> (TradeExecutor, ManualClock) {
        let clock = ManualClock::new(start());
        let view = Arc::new(view);
        let executor = TradeExecutor::with_clock(
            DecisionCoreConfig::default(),
            view.clone(),
            view,
            Arc::new(clock.clone()),
        );
        (executor, clock)
    }

    #[test]
    fn test_trade_carries_tags_and_metadata() {
        let (mut executor, _) = executor_with(StaticMarketView::default());

        let trade = executor.evaluate(signal("EUR/USD", 1.2345, start())).unwrap();
        assert_eq!(trade.tags, vec!["confidence_0.80".to_string()]);
        assert_eq!(trade.metadata["expiry_minutes"], 5);
        assert_eq!(trade.metadata["indicators"]["entry_price"], 1.2345);
        assert_eq!(trade.entry_time, start());
    }

    #[test]
    fn test_entry_time_is_signal_time() {
        let (mut executor, clock) = executor_with(StaticMarketView::default());
        clock.set(start() + Duration::seconds(30));

        let trade = executor.evaluate(signal("EUR/USD", 1.2345, start())).unwrap();
        assert_eq!(trade.entry_time, start());
        assert_eq!(trade.metadata["processed_at"], json!(start() + Duration::seconds(30)));

        executor
            .close_trade(trade.id, 1.2355, start() + Duration::seconds(10))
            .unwrap();
        let stats = executor.ledger().get_stats(common::StatsWindow::All);
        assert_eq!(stats.avg_holding_secs, 10.0);
    }

    #[test]
    fn test_exit_levels_read_from_indicators() {
        let (mut executor, _) = executor_with(StaticMarketView::default());
        let mut decision = signal("EUR/USD", 1.2345, start());
        decision.indicators.extra.insert("stop_loss".to_string(), 1.2300);
        decision.indicators.extra.insert("take_profit".to_string(), 1.2420);

        let trade = executor.evaluate(decision).unwrap();
        assert_eq!(trade.stop_loss, Some(1.2300));
        assert_eq!(trade.take_profit, Some(1.2420));
    }

    #[test]
    fn test_low_confidence_rejected() {
        let (mut executor, _) = executor_with(StaticMarketView::default());
        let mut decision = signal("EUR/USD", 1.2, start());
        decision.confidence = 0.4;

        assert!(matches!(executor.evaluate(decision), Err(Rejection::LowConfidence { .. })));
        assert!(executor.process_signal(signal("EUR/USD", 1.2010, start() + Duration::seconds(30))).is_some());
    }

    #[test]
    fn test_unfavorable_market_rejected() {
        let (mut executor, _) = executor_with(StaticMarketView::unfavorable("Spread too wide"));

        let rejection = executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap_err();
        assert_eq!(
            rejection,
            Rejection::UnfavorableMarket {
                reason: "Spread too wide".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_asset_rejected() {
        let (mut executor, clock) = executor_with(StaticMarketView::default());
        executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap();

        clock.advance(Duration::minutes(20));
        let rejection = executor
            .evaluate(signal("EUR/USD", 1.2010, start() + Duration::seconds(60)))
            .unwrap_err();
        assert_eq!(rejection.code(), "duplicate_asset");
    }

    #[test]
    fn test_spacing_uses_wall_clock() {
        let (mut executor, clock) = executor_with(StaticMarketView::default());
        executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap();

        clock.advance(Duration::minutes(5));
        let rejection = executor
            .evaluate(signal("GBP/USD", 1.2010, start() + Duration::minutes(5)))
            .unwrap_err();
        assert!(matches!(rejection, Rejection::TooSoon { elapsed_minutes: 5, minimum: 15 }));

        // signals only 30s apart, but 15 wall-clock minutes have passed
        clock.advance(Duration::minutes(10));
        assert!(executor
            .evaluate(signal("GBP/USD", 1.2020, start() + Duration::minutes(5) + Duration::seconds(30)))
            .is_ok());
    }

    #[test]
    fn test_crossed_book_with_future_timestamp_rejected() {
        let (mut executor, _) = executor_with(StaticMarketView::default());
        let mut decision = signal("EUR/USD", 1.2015, start() + Duration::minutes(10));
        decision.indicators.bids = vec![BookLevel::new(1.2020, 1.0)];
        decision.indicators.asks = vec![BookLevel::new(1.2010, 1.0)];

        let rejection = executor.evaluate(decision).unwrap_err();
        assert!(matches!(
            rejection,
            Rejection::DataQualitySeverity {
                severity: Severity::High,
                ..
            }
        ));
        assert!(executor.gate().history().is_empty());
    }

    #[test]
    fn test_corrected_book_is_applied_and_tagged() {
        let (mut executor, _) = executor_with(StaticMarketView::default());
        let mut decision = signal("EUR/USD", 1.2015, start());
        decision.indicators.bids = vec![BookLevel::new(1.2020, 1.0)];
        decision.indicators.asks = vec![BookLevel::new(1.2010, 1.0)];

        let trade = executor.evaluate(decision).unwrap();
        assert!(trade.tags.contains(&"order_book_anomaly".to_string()));
        assert_eq!(trade.entry_price, 1.2015);

        let bids = &trade.metadata["indicators"]["bids"];
        assert_eq!(bids.as_array().map(|b| b.len()), Some(1));
    }

    #[test]
    fn test_invalid_entry_price_rejected() {
        let (mut executor, _) = executor_with(StaticMarketView::default());
        let mut decision = signal("EUR/USD", 1.2, start());
        decision.indicators.entry_price = f64::NAN;

        assert_eq!(executor.evaluate(decision).unwrap_err().code(), "invalid_signal");
    }

    #[test]
    fn test_exhausted_budget_rejected() {
        let view = StaticMarketView {
            volatility: 10_000.0,
            baseline_volatility: 10_000.0,
            ..Default::default()
        };
        let (mut executor, _) = executor_with(view);

        let rejection = executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap_err();
        assert_eq!(rejection.code(), "no_position_size");
        assert_eq!(executor.daily_trade_count(), 0);
    }

    #[test]
    fn test_close_tracks_consecutive_losses() {
        let (mut executor, clock) = executor_with(StaticMarketView::default());

        let trade = executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap();
        let closed = executor.close_trade(trade.id, 1.19, clock.now()).unwrap();
        assert!(closed.realized_pnl() < 0.0);
        assert_eq!(executor.consecutive_losses(), 1);

        assert!(executor.close_trade(trade.id, 1.25, clock.now()).is_none());
        assert_eq!(executor.consecutive_losses(), 1);
        assert!(executor.active_trades().is_empty());
    }

    #[test]
    fn test_invalid_exit_price_keeps_trade_open() {
        let (mut executor, clock) = executor_with(StaticMarketView::default());
        let trade = executor.evaluate(signal("EUR/USD", 1.2, start())).unwrap();

        assert!(executor.close_trade(trade.id, f64::NAN, clock.now()).is_none());
        assert!(executor.has_open_trade("EUR/USD"));
    }
}
