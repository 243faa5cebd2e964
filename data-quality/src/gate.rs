//! Data quality gate
//!
//! Decides whether the market context of a candidate decision can be trusted,
//! and proposes a corrected payload where a correction policy exists.

use crate::anomaly::{derive_confidence, derive_severity, AnomalyKind, AnomalyReport};
use crate::checks;
use crate::config::QualityConfig;
use crate::corrections::apply_corrections;
use crate::history::TrailingHistory;
use crate::snapshot::MarketSnapshot;
use common::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Stateful quality gate. One instance per running strategy.
pub struct DataQualityGate {
    config: QualityConfig,
    history: TrailingHistory,
    consecutive_anomalies: u32,
    clock: Arc<dyn Clock>,
}

impl DataQualityGate {
    pub fn new(config: QualityConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: QualityConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            history: TrailingHistory::new(config.history_limit),
            config,
            consecutive_anomalies: 0,
            clock,
        }
    }

    /// Run every check against the snapshot. Never fails: internal faults
    /// produce a `validation_error` report with high severity and zero confidence.
    pub fn evaluate(&mut self, snapshot: &MarketSnapshot) -> AnomalyReport {
        match self.try_evaluate(snapshot) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Data validation failed");
                self.consecutive_anomalies = self.consecutive_anomalies.saturating_add(1);
                AnomalyReport::validation_error(snapshot.clone())
            }
        }
    }

    fn try_evaluate(&mut self, snapshot: &MarketSnapshot) -> anyhow::Result<AnomalyReport> {
        snapshot.ensure_finite()?;

        let anomalies = self.detect(snapshot);

        if anomalies.is_empty() {
            self.consecutive_anomalies = 0;
        } else {
            self.consecutive_anomalies = self.consecutive_anomalies.saturating_add(1);
        }

        let severity = derive_severity(&anomalies, self.config.severity_threshold);
        let confidence = derive_confidence(&anomalies, self.consecutive_anomalies, &self.config);

        let (corrected, corrections) = match apply_corrections(snapshot, &anomalies, &self.history, &self.config) {
            Some((corrected, applied)) => (Some(corrected), applied),
            None => (None, Vec::new()),
        };

        if anomalies.is_empty() {
            debug!("Market data passed all quality checks");
        } else {
            warn!(
                anomalies = ?anomalies.iter().map(|a| a.tag()).collect::<Vec<_>>(),
                severity = ?severity,
                confidence = confidence,
                consecutive = self.consecutive_anomalies,
                "Market data anomalies detected"
            );
        }

        Ok(AnomalyReport::new(
            snapshot.clone(),
            corrected,
            anomalies,
            corrections,
            severity,
            confidence,
        ))
    }

    fn detect(&self, snapshot: &MarketSnapshot) -> Vec<AnomalyKind> {
        let now = self.clock.now();
        let config = &self.config;
        let history = &self.history;

        let detected = [
            (AnomalyKind::TickerFrozen, checks::is_ticker_frozen(snapshot, history, config)),
            (
                AnomalyKind::InvalidTimestamp,
                checks::is_timestamp_invalid(snapshot, history, now, config),
            ),
            (AnomalyKind::AbnormalVolume, checks::is_volume_abnormal(snapshot, history, config)),
            (AnomalyKind::InsufficientTicks, checks::has_insufficient_ticks(snapshot, config)),
            (AnomalyKind::OrderBookAnomaly, checks::is_order_book_inconsistent(snapshot, config)),
        ];

        detected
            .into_iter()
            .filter_map(|(kind, present)| present.then_some(kind))
            .collect()
    }

    /// Record an accepted payload into the trailing history
    pub fn accept(&mut self, snapshot: &MarketSnapshot) {
        self.history.record(snapshot);
    }

    pub fn consecutive_anomalies(&self) -> u32 {
        self.consecutive_anomalies
    }

    pub fn history(&self) -> &TrailingHistory {
        &self.history
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Forget all trailing state
    pub fn reset(&mut self) {
        self.history.clear();
        self.consecutive_anomalies = 0;
    }
}

impl Default for DataQualityGate {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::Severity;
    use chrono::{DateTime, Duration, Utc};
    use common::{BookLevel, ManualClock};

    fn clean_snapshot(timestamp: DateTime<Utc>, close: f64) -> MarketSnapshot {
        MarketSnapshot {
            timestamp,
            close,
            volume: 1000.0,
            tick_count: 150,
            bids: vec![BookLevel::new(close - 0.0001, 1.0), BookLevel::new(close - 0.0002, 2.0)],
            asks: vec![BookLevel::new(close + 0.0001, 1.0), BookLevel::new(close + 0.0002, 2.0)],
        }
    }

    fn gate_at(start: DateTime<Utc>) -> (DataQualityGate, ManualClock) {
        let clock = ManualClock::new(start);
        let gate = DataQualityGate::with_clock(QualityConfig::default(), Arc::new(clock.clone()));
        (gate, clock)
    }

    #[test]
    fn test_clean_payload() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        let report = gate.evaluate(&clean_snapshot(start, 1.2000));
        assert!(report.is_clean());
        assert_eq!(report.confidence, 1.0);
        assert_eq!(report.severity, Severity::Low);
        assert!(report.corrected.is_none());
    }

    #[test]
    fn test_frozen_feed_detected() {
        let start = Utc::now();
        let (mut gate, clock) = gate_at(start);

        let mut frozen_seen = false;
        for i in 0..10 {
            let ts = start + Duration::seconds(60 * i);
            clock.set(ts);
            let snapshot = clean_snapshot(ts, 1.2000);
            let report = gate.evaluate(&snapshot);
            frozen_seen |= report.has(AnomalyKind::TickerFrozen);
            gate.accept(&snapshot);
        }

        assert!(frozen_seen);
    }

    #[test]
    fn test_crossed_book_with_future_timestamp_is_high() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        let mut snapshot = clean_snapshot(start + Duration::minutes(10), 1.2015);
        snapshot.bids = vec![BookLevel::new(1.2020, 1.0)];
        snapshot.asks = vec![BookLevel::new(1.2010, 1.0)];

        let report = gate.evaluate(&snapshot);
        assert!(report.has(AnomalyKind::OrderBookAnomaly));
        assert!(report.has(AnomalyKind::InvalidTimestamp));
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn test_crossed_book_alone() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        let mut snapshot = clean_snapshot(start, 1.2015);
        snapshot.bids = vec![BookLevel::new(1.2020, 1.0)];
        snapshot.asks = vec![BookLevel::new(1.2010, 1.0)];

        let report = gate.evaluate(&snapshot);
        assert_eq!(report.anomalies, vec![AnomalyKind::OrderBookAnomaly]);
        assert_eq!(report.severity, Severity::Medium);
        assert!(report.corrected.is_some());
    }

    #[test]
    fn test_consecutive_counter_resets_on_clean() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        let mut thin = clean_snapshot(start, 1.2);
        thin.tick_count = 10;

        let first = gate.evaluate(&thin);
        let second = gate.evaluate(&thin);
        assert_eq!(gate.consecutive_anomalies(), 2);
        assert!(second.confidence <= first.confidence);

        gate.evaluate(&clean_snapshot(start, 1.2));
        assert_eq!(gate.consecutive_anomalies(), 0);
    }

    #[test]
    fn test_non_finite_input_degrades_to_validation_error() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        let mut broken = clean_snapshot(start, 1.2);
        broken.volume = f64::NAN;

        let report = gate.evaluate(&broken);
        assert_eq!(report.anomalies, vec![AnomalyKind::ValidationError]);
        assert_eq!(report.severity, Severity::High);
        assert_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_evaluate_does_not_touch_history() {
        let start = Utc::now();
        let (mut gate, _) = gate_at(start);

        gate.evaluate(&clean_snapshot(start, 1.2));
        assert!(gate.history().is_empty());

        gate.accept(&clean_snapshot(start, 1.2));
        assert_eq!(gate.history().prices().len(), 1);
    }
}
