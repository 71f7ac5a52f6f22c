//! # Equidad: Subgroup Disparity & Calibration Audit
//!
//! Equidad audits a binary classifier's predictions for performance
//! disparities across demographic subgroups and risk-calibration
//! strata. It is a read-only measurement pass over already-produced
//! predictions and labels: nothing here trains or mitigates.
//!
//! ## Architecture
//!
//! - **data**: audit population table and protected-attribute columns
//! - **groups**: marginal/intersectional subgroup enumeration and
//!   risk stratification with small-sample filtering
//! - **metrics**: base error-rate metrics, the subgroup deviation
//!   evaluator, and the multicalibration / differential-calibration
//!   losses
//! - **report**: the disparity-report driver with worst-group selection
//! - **model**: the `predict_proba` seam for model-driven scorers

pub mod data;
pub mod groups;
pub mod metrics;
pub mod model;
pub mod report;

pub mod error;

// Re-export commonly used types
pub use data::{AuditTable, ProtectedAttributes};
pub use error::{Error, Result};
pub use groups::{GroupKey, Grouping, RiskBins};
pub use metrics::{
    differential_calibration_loss, multicalibration_loss, subgroup_loss, BaseMetric,
    CalibrationConfig, DeviationRecord, SubgroupOptions, SubgroupOutcome,
};
pub use model::{ColumnModel, ProbabilisticClassifier};
pub use report::{measure_disparity, DisparityReport, ReportConfig};
