//! Trade ledger: the process-lifetime record of active and closed trades

use crate::stats::{compute_stats, in_window};
use chrono::{DateTime, Utc};
use common::{Clock, PipConvention, StatsSource, StatsWindow, SystemClock, Trade, TradeStats};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Source of truth for trades and the statistics derived from them
pub struct TradeLedger {
    /// Open trades by id
    active: HashMap<Uuid, Trade>,

    /// Closed trades in close order
    closed: Vec<Trade>,

    /// Closed-trade positions in `closed`, by id
    closed_index: HashMap<Uuid, usize>,

    /// Closed-trade positions in `closed`, by asset
    by_asset: HashMap<String, Vec<usize>>,

    pips: PipConvention,
    clock: Arc<dyn Clock>,
}

impl TradeLedger {
    pub fn new(pips: PipConvention) -> Self {
        Self::with_clock(pips, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(pips: PipConvention, clock: Arc<dyn Clock>) -> Self {
        Self {
            active: HashMap::new(),
            closed: Vec::new(),
            closed_index: HashMap::new(),
            by_asset: HashMap::new(),
            pips,
            clock,
        }
    }

    fn contains(&self, id: &Uuid) -> bool {
        self.active.contains_key(id) || self.closed_index.contains_key(id)
    }

    /// Register a new open trade. Returns false if the id is already known.
    pub fn open(&mut self, trade: Trade) -> bool {
        if !trade.is_open() {
            warn!(trade_id = %trade.id, "Refusing to open a trade that is already closed");
            return false;
        }
        self.track(trade)
    }

    /// Register a trade in any status; closed trades go straight to history.
    /// Returns false if the id is already known.
    pub fn track(&mut self, trade: Trade) -> bool {
        if self.contains(&trade.id) {
            debug!(trade_id = %trade.id, "Trade already tracked");
            return false;
        }

        if trade.is_open() {
            info!(
                trade_id = %trade.id,
                asset = %trade.asset,
                direction = %trade.direction,
                entry_price = trade.entry_price,
                size = trade.position_size,
                "Trade opened"
            );
            self.active.insert(trade.id, trade);
        } else {
            self.archive(trade);
        }
        true
    }

    /// Close an active trade, valuing it with the pip convention.
    ///
    /// Returns the closed trade, or `None` when the id is not active.
    pub fn close(&mut self, id: Uuid, exit_price: f64, exit_time: DateTime<Utc>) -> Option<Trade> {
        let mut trade = self.active.remove(&id)?;

        let pnl = self.pips.profit_loss(&trade, exit_price);
        trade.close(exit_price, exit_time, pnl);

        info!(
            trade_id = %trade.id,
            asset = %trade.asset,
            exit_price = exit_price,
            profit_loss = pnl,
            "Trade closed"
        );

        self.archive(trade.clone());
        Some(trade)
    }

    fn archive(&mut self, trade: Trade) {
        let position = self.closed.len();
        self.closed_index.insert(trade.id, position);
        self.by_asset.entry(trade.asset.clone()).or_default().push(position);
        self.closed.push(trade);
    }

    /// Look up a trade by id, active or closed
    pub fn get(&self, id: &Uuid) -> Option<&Trade> {
        self.active
            .get(id)
            .or_else(|| self.closed_index.get(id).map(|&i| &self.closed[i]))
    }

    pub fn active_trades(&self) -> impl Iterator<Item = &Trade> {
        self.active.values()
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed
    }

    /// Closed trades for one asset, in close order
    pub fn history_for(&self, asset: &str) -> Vec<&Trade> {
        self.by_asset
            .get(asset)
            .map(|positions| positions.iter().map(|&i| &self.closed[i]).collect())
            .unwrap_or_default()
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    pub fn pip_convention(&self) -> PipConvention {
        self.pips
    }

    /// Statistics over the trailing window ending now
    pub fn get_stats(&self, window: StatsWindow) -> TradeStats {
        self.get_stats_at(window, self.clock.now())
    }

    /// Statistics over the trailing window ending at `now`.
    /// Faults are logged and yield the zeroed record.
    pub fn get_stats_at(&self, window: StatsWindow, now: DateTime<Utc>) -> TradeStats {
        let trades = in_window(&self.closed, window, now);
        match compute_stats(&trades) {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, window = ?window, "Failed to compute trade statistics");
                TradeStats::default()
            }
        }
    }
}

impl Default for TradeLedger {
    fn default() -> Self {
        Self::new(PipConvention::default())
    }
}

impl StatsSource for TradeLedger {
    fn trailing_stats(&self, window: StatsWindow) -> TradeStats {
        self.get_stats(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{Direction, ManualClock, TradeStatus};

    fn ledger_at(now: DateTime<Utc>) -> (TradeLedger, ManualClock) {
        let clock = ManualClock::new(now);
        let ledger = TradeLedger::with_clock(PipConvention::default(), Arc::new(clock.clone()));
        (ledger, clock)
    }

    #[test]
    fn test_open_and_close() {
        let now = Utc::now();
        let (mut ledger, _) = ledger_at(now);

        let trade = Trade::open("EUR/USD", Direction::Buy, 1.2000, now, 1.0);
        let id = trade.id;
        assert!(ledger.open(trade));
        assert_eq!(ledger.num_active(), 1);

        let closed = ledger.close(id, 1.2010, now + Duration::minutes(5)).unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert!((closed.realized_pnl() - 10.0).abs() < 1e-6);
        assert_eq!(ledger.num_active(), 0);
        assert_eq!(ledger.closed_trades().len(), 1);
        assert_eq!(ledger.get(&id).unwrap().status, TradeStatus::Closed);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let now = Utc::now();
        let (mut ledger, _) = ledger_at(now);

        let trade = Trade::open("EUR/USD", Direction::Buy, 1.2, now, 1.0);
        assert!(ledger.open(trade.clone()));
        assert!(!ledger.open(trade.clone()));

        ledger.close(trade.id, 1.2, now);
        assert!(!ledger.track(trade));
    }

    #[test]
    fn test_close_unknown_is_none() {
        let (mut ledger, _) = ledger_at(Utc::now());
        assert!(ledger.close(Uuid::new_v4(), 1.2, Utc::now()).is_none());
    }

    #[test]
    fn test_double_close_is_none() {
        let now = Utc::now();
        let (mut ledger, _) = ledger_at(now);

        let trade = Trade::open("EUR/USD", Direction::Sell, 1.2, now, 1.0);
        let id = trade.id;
        ledger.open(trade);

        assert!(ledger.close(id, 1.19, now).is_some());
        assert!(ledger.close(id, 1.18, now).is_none());
        assert_eq!(ledger.closed_trades().len(), 1);
    }

    #[test]
    fn test_history_by_asset() {
        let now = Utc::now();
        let (mut ledger, _) = ledger_at(now);

        for asset in ["EUR/USD", "GBP/USD", "EUR/USD"] {
            let trade = Trade::open(asset, Direction::Buy, 1.2, now, 1.0);
            let id = trade.id;
            ledger.open(trade);
            ledger.close(id, 1.21, now);
        }

        assert_eq!(ledger.history_for("EUR/USD").len(), 2);
        assert_eq!(ledger.history_for("GBP/USD").len(), 1);
        assert!(ledger.history_for("USD/JPY").is_empty());
    }

    #[test]
    fn test_stats_window_follows_clock() {
        let now = Utc::now();
        let (mut ledger, clock) = ledger_at(now);

        let trade = Trade::open("EUR/USD", Direction::Buy, 1.2000, now, 1.0);
        let id = trade.id;
        ledger.open(trade);
        ledger.close(id, 1.2010, now);

        assert_eq!(ledger.get_stats(StatsWindow::Day).total_trades, 1);

        clock.advance(Duration::days(2));
        assert_eq!(ledger.get_stats(StatsWindow::Day).total_trades, 0);
        assert_eq!(ledger.trailing_stats(StatsWindow::Week).total_trades, 1);
    }

    #[test]
    fn test_poisoned_history_degrades_to_zeroed_stats() {
        let now = Utc::now();
        let (mut ledger, _) = ledger_at(now);

        let mut broken = Trade::open("EUR/USD", Direction::Buy, 1.2, now, 1.0);
        broken.close(1.2, now, f64::NAN);
        ledger.track(broken);

        assert_eq!(ledger.get_stats(StatsWindow::All), TradeStats::default());
    }
}
