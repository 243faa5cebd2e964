//! Individual data quality checks.
//!
//! Each check looks at one aspect of the snapshot against the trailing
//! history and reports whether its anomaly is present.

use crate::config::QualityConfig;
use crate::history::TrailingHistory;
use crate::snapshot::MarketSnapshot;
use chrono::{DateTime, Duration, Utc};

/// The last `frozen_window` closes, current included, all inside the epsilon band
pub fn is_ticker_frozen(snapshot: &MarketSnapshot, history: &TrailingHistory, config: &QualityConfig) -> bool {
    let needed = config.frozen_window.saturating_sub(1);
    if needed == 0 || history.prices().len() < needed {
        return false;
    }

    let (low, high) = history
        .recent_prices(needed)
        .fold((snapshot.close, snapshot.close), |(lo, hi), p| (lo.min(p), hi.max(p)));

    high - low <= config.frozen_epsilon
}

/// Future beyond tolerance, not strictly after the previous accepted timestamp,
/// or too far after it
pub fn is_timestamp_invalid(
    snapshot: &MarketSnapshot,
    history: &TrailingHistory,
    now: DateTime<Utc>,
    config: &QualityConfig,
) -> bool {
    if snapshot.timestamp > now + Duration::seconds(config.future_tolerance_secs) {
        return true;
    }

    match history.last_timestamp() {
        Some(last) => {
            snapshot.timestamp <= last
                || snapshot.timestamp - last > Duration::seconds(config.max_timestamp_gap_secs)
        }
        None => false,
    }
}

/// Exponentially weighted volume statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl VolumeStats {
    /// Weighted mean/std of the recent accepted volumes; the most recent carries weight 1
    pub fn from_history(history: &TrailingHistory, config: &QualityConfig) -> Option<Self> {
        let weighted: Vec<(f64, f64)> = history
            .recent_volumes_newest_first(config.volume_window)
            .enumerate()
            .map(|(i, v)| (v, config.volume_decay.powi(i as i32)))
            .collect();

        let weight_sum: f64 = weighted.iter().map(|(_, w)| w).sum();
        if weighted.is_empty() || weight_sum <= 0.0 {
            return None;
        }

        let mean = weighted.iter().map(|(v, w)| v * w).sum::<f64>() / weight_sum;
        let variance = weighted.iter().map(|(v, w)| w * (v - mean).powi(2)).sum::<f64>() / weight_sum;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    pub fn z_score(&self, volume: f64) -> f64 {
        if self.std_dev > 0.0 {
            (volume - self.mean) / self.std_dev
        } else {
            0.0
        }
    }
}

/// Z-score of the snapshot's volume, if it can be judged at all
pub fn volume_z_score(snapshot: &MarketSnapshot, history: &TrailingHistory, config: &QualityConfig) -> Option<f64> {
    if snapshot.volume <= 0.0 {
        return None;
    }
    VolumeStats::from_history(history, config).map(|stats| stats.z_score(snapshot.volume))
}

pub fn is_volume_abnormal(snapshot: &MarketSnapshot, history: &TrailingHistory, config: &QualityConfig) -> bool {
    volume_z_score(snapshot, history, config)
        .map(|z| z.abs() > config.volume_z_threshold)
        .unwrap_or(false)
}

pub fn has_insufficient_ticks(snapshot: &MarketSnapshot, config: &QualityConfig) -> bool {
    snapshot.tick_count < config.min_tick_count
}

/// Crossed levels, best prices not bracketing the last trade, bad spread,
/// or ladders out of order. Skipped when either side is empty.
pub fn is_order_book_inconsistent(snapshot: &MarketSnapshot, config: &QualityConfig) -> bool {
    if !snapshot.has_book() {
        return false;
    }

    let highest_bid = snapshot.bids.iter().map(|l| l.price).fold(f64::MIN, f64::max);
    let lowest_ask = snapshot.asks.iter().map(|l| l.price).fold(f64::MAX, f64::min);
    if highest_bid >= lowest_ask {
        return true;
    }

    let best_bid = snapshot.bids[0].price;
    let best_ask = snapshot.asks[0].price;

    if snapshot.close > 0.0 && (best_bid > snapshot.close || best_ask < snapshot.close) {
        return true;
    }

    let spread = best_ask - best_bid;
    if spread < 0.0 || spread > config.gap_threshold * 2.0 {
        return true;
    }

    let bids_ordered = snapshot.bids.windows(2).all(|w| w[1].price <= w[0].price);
    let asks_ordered = snapshot.asks.windows(2).all(|w| w[1].price >= w[0].price);

    !(bids_ordered && asks_ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookLevel;

    fn snapshot_at(timestamp: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            timestamp,
            close: 1.2000,
            volume: 1000.0,
            tick_count: 150,
            bids: vec![BookLevel::new(1.1999, 1.0), BookLevel::new(1.1998, 2.0)],
            asks: vec![BookLevel::new(1.2001, 1.0), BookLevel::new(1.2002, 2.0)],
        }
    }

    #[test]
    fn test_frozen_needs_full_window() {
        let config = QualityConfig::default();
        let mut history = TrailingHistory::new(100);
        let now = Utc::now();

        for i in 0..3 {
            history.record(&snapshot_at(now + Duration::seconds(i)));
        }
        assert!(!is_ticker_frozen(&snapshot_at(now), &history, &config));

        history.record(&snapshot_at(now + Duration::seconds(4)));
        assert!(is_ticker_frozen(&snapshot_at(now), &history, &config));
    }

    #[test]
    fn test_frozen_broken_by_movement() {
        let config = QualityConfig::default();
        let mut history = TrailingHistory::new(100);
        let now = Utc::now();
        for i in 0..4 {
            history.record(&snapshot_at(now + Duration::seconds(i)));
        }

        let mut moved = snapshot_at(now);
        moved.close = 1.2005;
        assert!(!is_ticker_frozen(&moved, &history, &config));
    }

    #[test]
    fn test_timestamp_rules() {
        let config = QualityConfig::default();
        let now = Utc::now();
        let mut history = TrailingHistory::new(100);

        assert!(is_timestamp_invalid(&snapshot_at(now + Duration::minutes(5)), &history, now, &config));
        assert!(!is_timestamp_invalid(&snapshot_at(now + Duration::seconds(30)), &history, now, &config));

        history.record(&snapshot_at(now - Duration::seconds(120)));
        assert!(!is_timestamp_invalid(&snapshot_at(now), &history, now, &config));
        assert!(is_timestamp_invalid(&snapshot_at(now - Duration::seconds(120)), &history, now, &config));
        assert!(is_timestamp_invalid(&snapshot_at(now - Duration::seconds(200)), &history, now, &config));
        assert!(is_timestamp_invalid(&snapshot_at(now + Duration::seconds(200)), &history, now + Duration::seconds(200), &config));
    }

    #[test]
    fn test_weighted_volume_favors_recent() {
        let config = QualityConfig::default();
        let mut history = TrailingHistory::new(100);
        let now = Utc::now();
        for (i, volume) in [100.0, 100.0, 200.0].iter().enumerate() {
            let mut s = snapshot_at(now + Duration::seconds(i as i64));
            s.volume = *volume;
            history.record(&s);
        }

        let stats = VolumeStats::from_history(&history, &config).unwrap();
        // plain mean would be 133.3; the newest (200) carries the largest weight
        assert!(stats.mean > 134.0);
    }

    #[test]
    fn test_volume_spike_detected() {
        let config = QualityConfig::default();
        let mut history = TrailingHistory::new(100);
        let now = Utc::now();
        for i in 0..10 {
            let mut s = snapshot_at(now + Duration::seconds(i));
            s.volume = 1000.0 + (i % 2) as f64 * 50.0;
            history.record(&s);
        }

        let mut spike = snapshot_at(now);
        spike.volume = 5000.0;
        assert!(is_volume_abnormal(&spike, &history, &config));
        assert!(!is_volume_abnormal(&snapshot_at(now), &history, &config));
    }

    #[test]
    fn test_crossed_book() {
        let config = QualityConfig::default();
        let mut s = snapshot_at(Utc::now());
        s.close = 1.2015;
        s.bids = vec![BookLevel::new(1.2020, 1.0)];
        s.asks = vec![BookLevel::new(1.2010, 1.0)];
        assert!(is_order_book_inconsistent(&s, &config));
    }

    #[test]
    fn test_book_rules() {
        let config = QualityConfig::default();
        assert!(!is_order_book_inconsistent(&snapshot_at(Utc::now()), &config));

        let mut wide = snapshot_at(Utc::now());
        wide.bids = vec![BookLevel::new(1.1970, 1.0)];
        wide.asks = vec![BookLevel::new(1.2030, 1.0)];
        assert!(is_order_book_inconsistent(&wide, &config));

        let mut not_bracketing = snapshot_at(Utc::now());
        not_bracketing.close = 1.2010;
        assert!(is_order_book_inconsistent(&not_bracketing, &config));

        let mut unordered = snapshot_at(Utc::now());
        unordered.asks = vec![BookLevel::new(1.2003, 1.0), BookLevel::new(1.2002, 1.0)];
        assert!(is_order_book_inconsistent(&unordered, &config));

        let mut one_sided = snapshot_at(Utc::now());
        one_sided.asks.clear();
        assert!(!is_order_book_inconsistent(&one_sided, &config));
    }
}
