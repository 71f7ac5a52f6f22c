//! Disparity metrics.
//!
//! - **base**: scalar prediction metrics (rates, Brier, accuracy,
//!   ranked metrics)
//! - **subgroup**: per-group deviation evaluation against the
//!   population baseline
//! - **calibration**: multicalibration and differential-calibration
//!   losses over risk-stratified groups

pub mod base;
mod calibration;
mod subgroup;

pub use base::{
    accuracy, average_precision, brier_score, false_negative_rate, false_positive_rate,
    positivity, roc_auc, true_positive_rate,
};
pub use calibration::{
    differential_calibration_loss, differential_calibration_score, multicalibration_loss,
    multicalibration_loss_with, multicalibration_score, proportional_multicalibration_loss,
    proportional_multicalibration_score, CalibrationConfig,
};
pub use subgroup::{
    subgroup_brier_loss, subgroup_fnr_loss, subgroup_fpr_loss, subgroup_loss,
    subgroup_positivity_loss, subgroup_scorer, DeviationRecord, SubgroupOptions, SubgroupOutcome,
};

use std::str::FromStr;

use crate::error::Error;

/// Which end of the signed-deviation scale marks the harmed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmDirection {
    /// Lower is worse (under-prediction is the harm).
    Min,
    /// Higher is worse (excess error is the harm).
    Max,
}

/// A base metric the subgroup evaluator can deviate against.
///
/// A closed set of well-known metrics plus an explicit custom-function
/// case, so dispatch is statically checkable rather than inferred from
/// a name at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseMetric {
    FalsePositiveRate,
    FalseNegativeRate,
    Positivity,
    BrierScore,
    /// Any scalar function of `(y_true, y_pred)`.
    Custom {
        name: &'static str,
        f: fn(&[f64], &[f64]) -> f64,
    },
}

impl BaseMetric {
    /// Compute the metric over a population or subset.
    pub fn compute(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        match self {
            BaseMetric::FalsePositiveRate => base::false_positive_rate(y_true, y_pred),
            BaseMetric::FalseNegativeRate => base::false_negative_rate(y_true, y_pred),
            BaseMetric::Positivity => base::positivity(y_true, y_pred),
            BaseMetric::BrierScore => base::brier_score(y_true, y_pred),
            BaseMetric::Custom { f, .. } => f(y_true, y_pred),
        }
    }

    /// Display name used in report tables.
    pub fn name(&self) -> &str {
        match self {
            BaseMetric::FalsePositiveRate => "FPR",
            BaseMetric::FalseNegativeRate => "FNR",
            BaseMetric::Positivity => "Positivity Rate",
            BaseMetric::BrierScore => "Brier Score (MSE)",
            BaseMetric::Custom { name, .. } => name,
        }
    }

    /// Worst-group selection direction: minimum signed deviation for
    /// positivity (under-prediction is the harm), maximum for every
    /// other metric.
    pub fn harm_direction(&self) -> HarmDirection {
        match self {
            BaseMetric::Positivity => HarmDirection::Min,
            _ => HarmDirection::Max,
        }
    }
}

impl FromStr for BaseMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "FPR" => Ok(BaseMetric::FalsePositiveRate),
            "FNR" => Ok(BaseMetric::FalseNegativeRate),
            "positivity" => Ok(BaseMetric::Positivity),
            "MSE" | "brier" => Ok(BaseMetric::BrierScore),
            other => Err(Error::UnknownMetric(other.to_string())),
        }
    }
}
