//! Trade statistics over closed-trade history

use chrono::{DateTime, Utc};
use common::{StatsWindow, Trade, TradeStats};
use statrs::statistics::Statistics;

/// Closed trades whose exit falls inside the trailing window ending at `now`
pub fn in_window<'a>(
    trades: impl IntoIterator<Item = &'a Trade>,
    window: StatsWindow,
    now: DateTime<Utc>,
) -> Vec<&'a Trade> {
    let start = window.duration().map(|d| now - d);
    trades
        .into_iter()
        .filter(|t| !t.is_open())
        .filter(|t| match (start, t.exit_time) {
            (None, _) => true,
            (Some(start), Some(exit)) => exit >= start,
            (Some(_), None) => false,
        })
        .collect()
}

/// Aggregate statistics for a set of closed trades
pub fn compute_stats(trades: &[&Trade]) -> anyhow::Result<TradeStats> {
    if trades.is_empty() {
        return Ok(TradeStats::default());
    }

    let mut pnls = Vec::with_capacity(trades.len());
    for trade in trades {
        let pnl = trade
            .profit_loss
            .ok_or_else(|| anyhow::anyhow!("Closed trade {} has no profit/loss", trade.id))?;
        if !pnl.is_finite() {
            anyhow::bail!("Trade {} has non-finite profit/loss {}", trade.id, pnl);
        }
        pnls.push(pnl);
    }

    let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();

    let total_profit: f64 = wins.iter().sum();
    let total_loss: f64 = losses.iter().sum();

    let profit_factor = if total_loss != 0.0 {
        (total_profit / total_loss).abs()
    } else if total_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let holding: Vec<f64> = trades
        .iter()
        .filter_map(|t| t.holding_time())
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .collect();

    Ok(TradeStats {
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        total_profit,
        total_loss,
        win_rate: wins.len() as f64 / trades.len() as f64,
        profit_factor,
        avg_win: if wins.is_empty() { 0.0 } else { wins.iter().mean() },
        avg_loss: if losses.is_empty() { 0.0 } else { losses.iter().mean() },
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        max_drawdown: max_drawdown(trades),
        avg_holding_secs: if holding.is_empty() { 0.0 } else { holding.iter().mean() },
    })
}

/// Largest peak-to-current decline of cumulative P&L, ordered by exit time,
/// normalized by the peak (or by 1.0 while the peak is not positive)
pub fn max_drawdown(trades: &[&Trade]) -> f64 {
    let mut ordered: Vec<&Trade> = trades.iter().copied().filter(|t| t.exit_time.is_some()).collect();
    ordered.sort_by_key(|t| t.exit_time);

    let mut cumulative = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd: f64 = 0.0;

    for trade in ordered {
        cumulative += trade.realized_pnl();
        if cumulative > peak {
            peak = cumulative;
        }
        let base = if peak > 0.0 { peak } else { 1.0 };
        max_dd = max_dd.max((peak - cumulative) / base);
    }

    max_dd
}
