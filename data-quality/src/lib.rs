//! Data Quality Gate
//!
//! Inspects the market context attached to a candidate decision (closes,
//! volume, tick count, order book, timestamps) and returns an
//! [`AnomalyReport`] with a severity, a confidence and an optional corrected
//! payload.

mod anomaly;
mod checks;
mod config;
mod corrections;
mod gate;
mod history;
mod snapshot;

pub use anomaly::{derive_confidence, derive_severity, AnomalyKind, AnomalyReport, Severity};
pub use checks::VolumeStats;
pub use config::QualityConfig;
pub use gate::DataQualityGate;
pub use history::TrailingHistory;
pub use snapshot::MarketSnapshot;
