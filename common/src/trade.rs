//! Trades, statistics records and the pip convention used to value them

use crate::decision::Direction;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Trade lifecycle state. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A single trade, from admission to permanent history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub asset: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub position_size: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Set only at close
    pub profit_loss: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Trade {
    /// Create a new open trade with a fresh identifier
    pub fn open(
        asset: &str,
        direction: Direction,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        position_size: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset: asset.to_string(),
            direction,
            entry_price,
            entry_time,
            position_size,
            stop_loss: None,
            take_profit: None,
            status: TradeStatus::Open,
            exit_price: None,
            exit_time: None,
            profit_loss: None,
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// The only legal transition: open -> closed.
    ///
    /// Returns false (and leaves the trade untouched) if it is already closed.
    pub fn close(&mut self, exit_price: f64, exit_time: DateTime<Utc>, profit_loss: f64) -> bool {
        if !self.is_open() {
            return false;
        }
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.profit_loss = Some(profit_loss);
        self.status = TradeStatus::Closed;
        true
    }

    /// Realized P&L, zero while open
    pub fn realized_pnl(&self) -> f64 {
        self.profit_loss.unwrap_or(0.0)
    }

    pub fn holding_time(&self) -> Option<Duration> {
        self.exit_time.map(|exit| exit - self.entry_time)
    }
}

/// Instrument pip convention used to express P&L in pip-equivalent units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipConvention {
    /// Price increment of one pip (0.0001 for most currency pairs)
    #[serde(default = "default_pip_size")]
    pub pip_size: f64,
    /// Value of one pip per unit of position size
    #[serde(default = "default_pip_value")]
    pub pip_value: f64,
}

impl PipConvention {
    /// P&L of closing `trade` at `exit_price`
    pub fn profit_loss(&self, trade: &Trade, exit_price: f64) -> f64 {
        let pips = (exit_price - trade.entry_price) * trade.direction.sign() / self.pip_size;
        pips * trade.position_size * self.pip_value
    }
}

impl Default for PipConvention {
    fn default() -> Self {
        Self {
            pip_size: default_pip_size(),
            pip_value: default_pip_value(),
        }
    }
}

fn default_pip_size() -> f64 {
    0.0001
}

fn default_pip_value() -> f64 {
    1.0
}

/// Trailing window for statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatsWindow {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl StatsWindow {
    /// Length of the window, `None` for all history
    pub fn duration(self) -> Option<Duration> {
        match self {
            StatsWindow::Day => Some(Duration::days(1)),
            StatsWindow::Week => Some(Duration::days(7)),
            StatsWindow::Month => Some(Duration::days(30)),
            StatsWindow::Year => Some(Duration::days(365)),
            StatsWindow::All => None,
        }
    }
}

impl FromStr for StatsWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(StatsWindow::Day),
            "week" => Ok(StatsWindow::Week),
            "month" => Ok(StatsWindow::Month),
            "year" => Ok(StatsWindow::Year),
            "all" | "total" => Ok(StatsWindow::All),
            other => Err(anyhow::anyhow!("Unknown stats window: {}", other)),
        }
    }
}

/// Aggregate statistics over a set of closed trades
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Sum of winning P&L
    pub total_profit: f64,
    /// Sum of losing P&L (non-positive)
    pub total_loss: f64,
    pub win_rate: f64,
    /// `|total_profit / total_loss|`, infinite when there are wins but no losses
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Mean losing P&L (non-positive)
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Most negative P&L
    pub largest_loss: f64,
    /// Peak-normalized decline of cumulative P&L (0.0 to 1.0+)
    pub max_drawdown: f64,
    pub avg_holding_secs: f64,
}

impl TradeStats {
    pub fn avg_holding_time(&self) -> Duration {
        Duration::milliseconds((self.avg_holding_secs * 1000.0) as i64)
    }

    pub fn net_pnl(&self) -> f64 {
        self.total_profit + self.total_loss
    }
}

/// Supplier of windowed performance statistics
pub trait StatsSource {
    fn trailing_stats(&self, window: StatsWindow) -> TradeStats;
}
