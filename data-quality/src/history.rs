//! Bounded trailing history of accepted market data

use crate::snapshot::MarketSnapshot;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Ring buffers of accepted closes, volumes and timestamps (oldest first)
#[derive(Debug, Clone)]
pub struct TrailingHistory {
    prices: VecDeque<f64>,
    volumes: VecDeque<f64>,
    timestamps: VecDeque<DateTime<Utc>>,
    capacity: usize,
}

impl TrailingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            volumes: VecDeque::with_capacity(capacity),
            timestamps: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an accepted snapshot. Non-positive prices and volumes are skipped.
    pub fn record(&mut self, snapshot: &MarketSnapshot) {
        if snapshot.close > 0.0 {
            push_bounded(&mut self.prices, snapshot.close, self.capacity);
        }
        if snapshot.volume > 0.0 {
            push_bounded(&mut self.volumes, snapshot.volume, self.capacity);
        }
        push_bounded(&mut self.timestamps, snapshot.timestamp, self.capacity);
    }

    pub fn prices(&self) -> &VecDeque<f64> {
        &self.prices
    }

    pub fn volumes(&self) -> &VecDeque<f64> {
        &self.volumes
    }

    pub fn timestamps(&self) -> &VecDeque<DateTime<Utc>> {
        &self.timestamps
    }

    pub fn last_price(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    /// The `n` most recent prices, oldest first
    pub fn recent_prices(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        self.prices.iter().skip(self.prices.len().saturating_sub(n)).copied()
    }

    /// The `n` most recent volumes, newest first
    pub fn recent_volumes_newest_first(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        self.volumes.iter().rev().take(n).copied()
    }

    /// Mean spacing (seconds) of the last `n` timestamps
    pub fn mean_interval_secs(&self, n: usize) -> Option<f64> {
        let recent: Vec<_> = self
            .timestamps
            .iter()
            .skip(self.timestamps.len().saturating_sub(n))
            .collect();
        if recent.len() < 2 {
            return None;
        }
        let total: f64 = recent
            .windows(2)
            .map(|w| (*w[1] - *w[0]).num_milliseconds() as f64 / 1000.0)
            .sum();
        Some(total / (recent.len() - 1) as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.volumes.is_empty() && self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
        self.volumes.clear();
        self.timestamps.clear();
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, value: T, capacity: usize) {
    buffer.push_back(value);
    while buffer.len() > capacity {
        buffer.pop_front();
    }
}
