//! Runs a handful of candidate decisions through the decision core

use common::{BookLevel, CandidateDecision, Direction, Indicators, StaticMarketView, Utc};
use execution::{DecisionCoreConfig, TradeExecutor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, Level};

fn decision(asset: &str, direction: Direction, confidence: f64, close: f64) -> CandidateDecision {
    CandidateDecision {
        timestamp: Utc::now(),
        direction,
        asset: asset.to_string(),
        confidence,
        expiry_minutes: Some(5),
        indicators: Indicators {
            close,
            volume: 1200.0,
            tick_count: 180,
            bids: vec![BookLevel::new(close - 0.0001, 3.0)],
            asks: vec![BookLevel::new(close + 0.0001, 3.0)],
            entry_price: close,
            extra: BTreeMap::new(),
        },
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let mut config = DecisionCoreConfig::default();
    config.execution.min_minutes_between_trades = 0;

    let view = Arc::new(StaticMarketView::default());
    let mut executor = TradeExecutor::new(config, view.clone(), view);

    let signals = vec![
        decision("EUR/USD", Direction::Buy, 0.82, 1.0850),
        decision("GBP/USD", Direction::Sell, 0.45, 1.2640),
        decision("EUR/USD", Direction::Buy, 0.90, 1.0853),
        decision("USD/JPY", Direction::Sell, 0.75, 151.20),
    ];

    let mut opened = Vec::new();
    for signal in signals {
        if let Some(trade) = executor.process_signal(signal) {
            opened.push(trade);
        }
    }

    for trade in &opened {
        let exit = trade.entry_price * (1.0 + 0.0005 * trade.direction.sign());
        if let Some(closed) = executor.close_trade(trade.id, exit, Utc::now()) {
            info!(asset = %closed.asset, pnl = closed.realized_pnl(), "Closed");
        }
    }

    let stats = executor.ledger().get_stats(common::StatsWindow::All);
    info!(
        trades = stats.total_trades,
        win_rate = stats.win_rate,
        net_pnl = stats.net_pnl(),
        "Session summary"
    );

    Ok(())
}
