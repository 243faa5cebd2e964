//! Reasons a candidate decision does not become a trade

use data_quality::Severity;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("Invalid signal: {reason}")]
    InvalidSignal { reason: String },

    #[error("Data quality severity {severity:?} with anomalies {anomalies:?}")]
    DataQualitySeverity { severity: Severity, anomalies: Vec<String> },

    #[error("Data quality confidence {confidence:.2} below {minimum:.2} (anomalies {anomalies:?})")]
    DataQualityConfidence {
        confidence: f64,
        minimum: f64,
        anomalies: Vec<String>,
    },

    #[error("Signal confidence {confidence:.2} below minimum {minimum:.2}")]
    LowConfidence { confidence: f64, minimum: f64 },

    #[error("Market unfavorable: {reason}")]
    UnfavorableMarket { reason: String },

    #[error("Trade already open for {asset}")]
    DuplicateAsset { asset: String },

    #[error("Daily trade limit reached ({count}/{limit})")]
    DailyLimit { count: u32, limit: u32 },

    #[error("Only {elapsed_minutes} minutes since last trade, minimum {minimum}")]
    TooSoon { elapsed_minutes: i64, minimum: i64 },

    #[error("Recovery mode: {consecutive_losses} consecutive losses (threshold {threshold})")]
    RecoveryMode { consecutive_losses: u32, threshold: u32 },

    #[error("Position size {size} is not positive")]
    NoPositionSize { size: f64 },

    #[error("Position size {size} for {asset} exceeds the remaining risk budget")]
    RiskBudget { asset: String, size: f64 },

    #[error("Ledger refused trade for {asset}")]
    Ledger { asset: String },
}

impl Rejection {
    /// Short stable identifier for logs and counters
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidSignal { .. } => "invalid_signal",
            Rejection::DataQualitySeverity { .. } => "data_quality_severity",
            Rejection::DataQualityConfidence { .. } => "data_quality_confidence",
            Rejection::LowConfidence { .. } => "low_confidence",
            Rejection::UnfavorableMarket { .. } => "unfavorable_market",
            Rejection::DuplicateAsset { .. } => "duplicate_asset",
            Rejection::DailyLimit { .. } => "daily_limit",
            Rejection::TooSoon { .. } => "too_soon",
            Rejection::RecoveryMode { .. } => "recovery_mode",
            Rejection::NoPositionSize { .. } => "no_position_size",
            Rejection::RiskBudget { .. } => "risk_budget",
            Rejection::Ledger { .. } => "ledger",
        }
    }

    /// Whether the rejection came from the data quality stage
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Rejection::DataQualitySeverity { .. } | Rejection::DataQualityConfidence { .. }
        )
    }
}
