//! Shared handle for deployments that feed signals from several tasks
//!
//! Signal processing and trade closing read then write the risk budget and
//! the active set, so every call holds one lock for its whole duration.

use crate::executor::TradeExecutor;
use chrono::{DateTime, Utc};
use common::{CandidateDecision, Trade};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone)]
pub struct SharedTradeExecutor {
    inner: Arc<Mutex<TradeExecutor>>,
}

impl SharedTradeExecutor {
    pub fn new(executor: TradeExecutor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(executor)),
        }
    }

    pub async fn process_signal(&self, decision: CandidateDecision) -> Option<Trade> {
        self.inner.lock().await.process_signal(decision)
    }

    pub async fn close_trade(&self, id: Uuid, exit_price: f64, exit_time: DateTime<Utc>) -> Option<Trade> {
        self.inner.lock().await.close_trade(id, exit_price, exit_time)
    }

    /// Exclusive access for inspection or multi-step sequences
    pub async fn lock(&self) -> MutexGuard<'_, TradeExecutor> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecisionCoreConfig;
    use common::{BookLevel, Direction, Indicators, StaticMarketView};
    use std::collections::BTreeMap;

    fn signal(asset: &str, close: f64) -> CandidateDecision {
        CandidateDecision {
            timestamp: Utc::now(),
            direction: Direction::Sell,
            asset: asset.to_string(),
            confidence: 0.9,
            expiry_minutes: None,
            indicators: Indicators {
                close,
                volume: 1000.0,
                tick_count: 200,
                bids: vec![BookLevel::new(close - 0.0001, 1.0)],
                asks: vec![BookLevel::new(close + 0.0001, 1.0)],
                entry_price: close,
                extra: BTreeMap::new(),
            },
        }
    }

    fn shared() -> SharedTradeExecutor {
        let mut config = DecisionCoreConfig::default();
        config.execution.min_minutes_between_trades = 0;
        let view = Arc::new(StaticMarketView::default());
        SharedTradeExecutor::new(TradeExecutor::new(config, view.clone(), view))
    }

    #[tokio::test]
    async fn test_concurrent_signals_open_one_trade_per_asset() {
        let executor = shared();

        let mut handles = Vec::new();
        for i in 0..8 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                executor.process_signal(signal("EUR/USD", 1.2 + i as f64 * 0.001)).await
            }));
        }

        let mut opened = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                opened += 1;
            }
        }

        assert_eq!(opened, 1);
        let guard = executor.lock().await;
        assert_eq!(guard.active_trades().len(), 1);
        assert!(guard.sizer().risk_state().is_consistent());
    }

    #[tokio::test]
    async fn test_close_through_handle() {
        let executor = shared();

        let trade = executor.process_signal(signal("EUR/USD", 1.2)).await.unwrap();
        let closed = executor.close_trade(trade.id, 1.19, Utc::now()).await.unwrap();
        assert!(closed.realized_pnl() > 0.0);

        let guard = executor.lock().await;
        assert!(guard.sizer().risk_state().risk_per_symbol.is_empty());
        assert_eq!(guard.consecutive_losses(), 0);
    }
}
