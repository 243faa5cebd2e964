//! Anomaly tags, severity and confidence derivation
//!
//! Severity and confidence are pure functions of the tag set (plus the
//! consecutive-anomaly count for confidence), driven by the weight table on
//! [`AnomalyKind`].

use crate::config::QualityConfig;
use crate::snapshot::MarketSnapshot;
use serde::{Deserialize, Serialize};

/// Closed set of data anomalies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TickerFrozen,
    InvalidTimestamp,
    AbnormalVolume,
    InsufficientTicks,
    OrderBookAnomaly,
    ValidationError,
}

impl AnomalyKind {
    pub fn tag(self) -> &'static str {
        match self {
            AnomalyKind::TickerFrozen => "ticker_frozen",
            AnomalyKind::InvalidTimestamp => "invalid_timestamp",
            AnomalyKind::AbnormalVolume => "abnormal_volume",
            AnomalyKind::InsufficientTicks => "insufficient_ticks",
            AnomalyKind::OrderBookAnomaly => "order_book_anomaly",
            AnomalyKind::ValidationError => "validation_error",
        }
    }

    /// Contribution to the severity weight sum
    pub fn severity_weight(self) -> f64 {
        match self {
            AnomalyKind::TickerFrozen => 3.0,
            AnomalyKind::InvalidTimestamp => 2.0,
            AnomalyKind::AbnormalVolume => 1.0,
            AnomalyKind::InsufficientTicks => 1.0,
            AnomalyKind::OrderBookAnomaly => 3.0,
            AnomalyKind::ValidationError => 3.0,
        }
    }

    /// Contribution to the confidence penalty sum
    pub fn confidence_penalty(self) -> f64 {
        match self {
            AnomalyKind::TickerFrozen => 0.25,
            AnomalyKind::InvalidTimestamp => 0.15,
            AnomalyKind::AbnormalVolume => 0.15,
            AnomalyKind::InsufficientTicks => 0.10,
            AnomalyKind::OrderBookAnomaly => 0.20,
            AnomalyKind::ValidationError => 0.40,
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Coarse impact classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Combinations that are serious regardless of the weight sum
const CRITICAL_PAIR: [AnomalyKind; 2] = [AnomalyKind::OrderBookAnomaly, AnomalyKind::InvalidTimestamp];

/// Any two of these together cost extra confidence
const COMPOUNDING: [AnomalyKind; 3] = [
    AnomalyKind::OrderBookAnomaly,
    AnomalyKind::InvalidTimestamp,
    AnomalyKind::AbnormalVolume,
];

pub fn derive_severity(anomalies: &[AnomalyKind], severity_threshold: f64) -> Severity {
    if anomalies.is_empty() {
        return Severity::Low;
    }

    if anomalies.len() >= 3 || CRITICAL_PAIR.iter().all(|k| anomalies.contains(k)) {
        return Severity::High;
    }

    let total_weight: f64 = anomalies.iter().map(|a| a.severity_weight()).sum();
    if total_weight >= severity_threshold {
        Severity::High
    } else if total_weight >= severity_threshold * 0.7 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Confidence in the (possibly corrected) payload.
///
/// `consecutive` counts anomalous evaluations in a row, the current one included.
pub fn derive_confidence(anomalies: &[AnomalyKind], consecutive: u32, config: &QualityConfig) -> f64 {
    if anomalies.is_empty() {
        return 1.0;
    }

    let penalty_sum: f64 = anomalies.iter().map(|a| a.confidence_penalty()).sum();
    let mut confidence = config.base_confidence * (-0.5 * penalty_sum).exp();

    let consecutive_factor = (0.2 * (1.0 + consecutive as f64).ln()).min(0.8);
    confidence *= 1.0 - consecutive_factor;

    let compounding = COMPOUNDING.iter().filter(|k| anomalies.contains(k)).count();
    if compounding > 1 {
        confidence *= 0.8;
    }

    confidence.max(config.min_confidence)
}

/// Outcome of one data quality evaluation. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub original: MarketSnapshot,
    pub corrected: Option<MarketSnapshot>,
    /// In detection order, no duplicates
    pub anomalies: Vec<AnomalyKind>,
    /// Tags whose corrective transform changed the payload
    pub corrections: Vec<AnomalyKind>,
    pub severity: Severity,
    pub confidence: f64,
}

impl AnomalyReport {
    pub(crate) fn new(
        original: MarketSnapshot,
        corrected: Option<MarketSnapshot>,
        anomalies: Vec<AnomalyKind>,
        corrections: Vec<AnomalyKind>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self {
            original,
            corrected,
            anomalies,
            corrections,
            severity,
            confidence,
        }
    }

    /// Synthetic report for an evaluation that failed internally
    pub(crate) fn validation_error(original: MarketSnapshot) -> Self {
        Self::new(
            original,
            None,
            vec![AnomalyKind::ValidationError],
            Vec::new(),
            Severity::High,
            0.0,
        )
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.anomalies.contains(&kind)
    }

    /// The payload to act on: corrected when a correction exists
    pub fn payload(&self) -> &MarketSnapshot {
        self.corrected.as_ref().unwrap_or(&self.original)
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.anomalies.iter().map(|a| a.tag()).collect()
    }
}
