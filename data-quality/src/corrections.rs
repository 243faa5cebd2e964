//! One corrective transform per anomaly kind.
//!
//! Every transform reads the original snapshot and the trailing history, never
//! the output of another transform, so applying the table is idempotent.

use crate::anomaly::AnomalyKind;
use crate::checks::VolumeStats;
use crate::config::QualityConfig;
use crate::history::TrailingHistory;
use crate::snapshot::MarketSnapshot;
use chrono::Duration;
use common::BookLevel;

/// Applies the correction table for the detected anomalies.
///
/// Returns the corrected snapshot and the kinds that actually changed something,
/// or `None` when no transform applied.
pub fn apply_corrections(
    original: &MarketSnapshot,
    anomalies: &[AnomalyKind],
    history: &TrailingHistory,
    config: &QualityConfig,
) -> Option<(MarketSnapshot, Vec<AnomalyKind>)> {
    let mut corrected = original.clone();
    let mut applied = Vec::new();

    for kind in anomalies {
        let changed = match kind {
            AnomalyKind::TickerFrozen => correct_frozen(original, &mut corrected, history),
            AnomalyKind::InvalidTimestamp => correct_timestamp(&mut corrected, history),
            AnomalyKind::AbnormalVolume => correct_volume(original, &mut corrected, history, config),
            AnomalyKind::OrderBookAnomaly => correct_order_book(original, &mut corrected, config),
            AnomalyKind::InsufficientTicks | AnomalyKind::ValidationError => false,
        };
        if changed {
            applied.push(*kind);
        }
    }

    if applied.is_empty() {
        None
    } else {
        Some((corrected, applied))
    }
}

/// Extrapolate half of the last recorded move
fn correct_frozen(original: &MarketSnapshot, corrected: &mut MarketSnapshot, history: &TrailingHistory) -> bool {
    let recent: Vec<f64> = history.recent_prices(2).collect();
    if recent.len() < 2 {
        return false;
    }
    let trend = recent[1] - recent[0];
    corrected.close = recent[1] + trend * 0.5;
    corrected.close != original.close
}

/// Project the next timestamp from the mean recent interval
fn correct_timestamp(corrected: &mut MarketSnapshot, history: &TrailingHistory) -> bool {
    let (Some(last), Some(interval)) = (history.last_timestamp(), history.mean_interval_secs(10)) else {
        return false;
    };
    if interval <= 0.0 {
        return false;
    }
    corrected.timestamp = last + Duration::milliseconds((interval * 1000.0) as i64);
    true
}

/// Shrink the deviation from the weighted mean, harder for extreme z-scores
fn correct_volume(
    original: &MarketSnapshot,
    corrected: &mut MarketSnapshot,
    history: &TrailingHistory,
    config: &QualityConfig,
) -> bool {
    let volume = original.volume;
    if volume <= 0.0 {
        return false;
    }
    let Some(stats) = VolumeStats::from_history(history, config) else {
        return false;
    };

    let z = stats.z_score(volume).abs();
    if z <= config.volume_z_threshold {
        return false;
    }

    let shrink = if z > config.severe_z_threshold {
        0.2
    } else {
        (config.correction_factor / z).min(0.8)
    };

    corrected.volume = stats.mean + (volume - stats.mean) * shrink;
    tracing::info!(
        original = volume,
        corrected = corrected.volume,
        z_score = z,
        "Volume corrected"
    );
    true
}

/// Replace the book with one synthetic level per side around the close
fn correct_order_book(original: &MarketSnapshot, corrected: &mut MarketSnapshot, config: &QualityConfig) -> bool {
    if original.close <= 0.0 {
        return false;
    }
    let half_spread = config.gap_threshold / 2.0;
    corrected.bids = vec![BookLevel::new(original.close - half_spread, 1.0)];
    corrected.asks = vec![BookLevel::new(original.close + half_spread, 1.0)];
    true
}
