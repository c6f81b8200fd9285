pub mod risk;

pub use risk::{calculate_risk_metrics, RiskMetrics, RiskReport, NO_DATA_MESSAGE};
