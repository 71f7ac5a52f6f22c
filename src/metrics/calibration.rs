//! Calibration-gap losses over risk-stratified groups.
//!
//! Multicalibration measures the largest gap between predicted
//! probability and realized outcome rate in any retained
//! group-by-stratum category. Differential calibration measures the
//! largest log-ratio of outcome rates between adjacent groups sharing
//! a stratum.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::data::ProtectedAttributes;
use crate::error::{Error, Result};
use crate::groups::{categorize, stratify_groups, CategoryKey, Grouping, RiskBins};
use crate::metrics::subgroup::resolve_protected;
use crate::model::ProbabilisticClassifier;

/// Stratification and flooring knobs shared by the calibration losses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Grouping mode for category construction.
    pub grouping: Grouping,
    /// Equal-width bin count; ignored when `bins` is set. Defaults
    /// to 10.
    pub n_bins: Option<usize>,
    /// Explicit bin edges, strictly increasing.
    pub bins: Option<Vec<f64>>,
    /// Per-interval support filter knob.
    pub alpha: f64,
    /// Minimum group-prevalence filter knob.
    pub gamma: f64,
    /// Floor applied to outcome means before normalizing or taking
    /// logs.
    pub rho: f64,
    /// Normalize multicalibration gaps by the floored outcome mean.
    pub proportional: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::multicalibration()
    }
}

impl CalibrationConfig {
    /// Multicalibration defaults.
    pub fn multicalibration() -> Self {
        Self {
            grouping: Grouping::Intersectional,
            n_bins: None,
            bins: None,
            alpha: 0.01,
            gamma: 0.01,
            rho: 0.1,
            proportional: false,
        }
    }

    /// Proportional multicalibration: gaps normalized by outcome
    /// prevalence.
    pub fn proportional_multicalibration() -> Self {
        Self {
            proportional: true,
            ..Self::multicalibration()
        }
    }

    /// Differential-calibration defaults: no small-sample filtering,
    /// no floor.
    pub fn differential() -> Self {
        Self {
            grouping: Grouping::Intersectional,
            n_bins: None,
            bins: None,
            alpha: 0.0,
            gamma: 0.0,
            rho: 0.0,
            proportional: false,
        }
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_n_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = Some(n_bins);
        self
    }

    pub fn with_bins(mut self, edges: Vec<f64>) -> Self {
        self.bins = Some(edges);
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    fn risk_bins(&self) -> Result<RiskBins> {
        match &self.bins {
            Some(edges) => RiskBins::from_edges(edges.clone()),
            None => RiskBins::equal_width(self.n_bins.unwrap_or(10)),
        }
    }
}

fn subset_mean(values: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| values[i]).sum::<f64>() / indices.len() as f64
}

/// Maximum absolute calibration gap over retained categories.
///
/// # Errors
///
/// `LengthMismatch` on shape violations; `InvalidBins` for bad edges;
/// `ZeroOutcomeRate` when `proportional` is set, a category's outcome
/// mean is 0, and `rho` is 0.
pub fn multicalibration_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }
    let bins = cfg.risk_bins()?;
    let categories = categorize(attrs, y_pred, cfg.grouping, &bins, cfg.alpha, cfg.gamma)?;
    multicalibration_loss_with(y_true, y_pred, &categories, cfg)
}

/// Multicalibration over precomputed categories, for callers that
/// evaluate many models against one stratification.
pub fn multicalibration_loss_with(
    y_true: &[f64],
    y_pred: &[f64],
    categories: &[(CategoryKey, Vec<usize>)],
    cfg: &CalibrationConfig,
) -> Result<f64> {
    let mut loss = 0.0;
    for (key, indices) in categories {
        let outcome_mean = subset_mean(y_true, indices);
        let predicted_mean = subset_mean(y_pred, indices);
        let mut gap = (outcome_mean - predicted_mean).abs();
        if cfg.proportional {
            let floor = outcome_mean.max(cfg.rho);
            if floor <= 0.0 {
                return Err(Error::ZeroOutcomeRate {
                    context: format!("category {} / interval {}", key.group, key.interval),
                });
            }
            gap /= floor;
        }
        if gap > loss {
            loss = gap;
        }
    }
    Ok(loss)
}

/// Maximum adjacent-pair log-ratio of outcome rates within any
/// stratum.
///
/// Adjacent-pair-only comparison keeps the cost linear in group count
/// per stratum; groups are walked in the stable indexer order, so the
/// largest step-changes are still seen.
///
/// # Errors
///
/// `ZeroOutcomeRate` when a compared category's floored outcome mean
/// is non-positive (zero outcome rate with `rho == 0`).
pub fn differential_calibration_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }
    let bins = cfg.risk_bins()?;
    let strata = stratify_groups(attrs, y_pred, cfg.grouping, &bins, cfg.alpha, cfg.gamma)?;

    let mut dc_max = 0.0;
    for (interval, groups) in &strata {
        for pair in groups.windows(2) {
            let mut rates = [0.0; 2];
            for (slot, (key, indices)) in rates.iter_mut().zip(pair) {
                let floored = subset_mean(y_true, indices).max(cfg.rho);
                if floored <= 0.0 {
                    return Err(Error::ZeroOutcomeRate {
                        context: format!("stratum {interval}, group {key}"),
                    });
                }
                *slot = floored;
            }
            let dc = (rates[0].ln() - rates[1].ln()).abs();
            if dc > dc_max {
                dc_max = dc;
            }
        }
    }
    Ok(dc_max)
}

fn predict(
    model: &dyn ProbabilisticClassifier,
    features: ArrayView2<'_, f64>,
    y_true: &[f64],
) -> Result<Vec<f64>> {
    if features.nrows() != y_true.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            got: features.nrows(),
        });
    }
    Ok(model.predict_proba(features).to_vec())
}

/// Model-driven multicalibration score: negated loss, higher is
/// better, for use as a model-selection objective.
pub fn multicalibration_score(
    model: &dyn ProbabilisticClassifier,
    features: ArrayView2<'_, f64>,
    y_true: &[f64],
    attributes: &ProtectedAttributes,
    groups: Option<&[String]>,
    protected: Option<&ProtectedAttributes>,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    let resolved = resolve_protected(attributes, groups, protected)?;
    let y_pred = predict(model, features, y_true)?;
    Ok(-multicalibration_loss(y_true, &y_pred, &resolved, cfg)?)
}

/// Multicalibration with prevalence normalization forced on.
pub fn proportional_multicalibration_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    let cfg = CalibrationConfig {
        proportional: true,
        ..cfg.clone()
    };
    multicalibration_loss(y_true, y_pred, attrs, &cfg)
}

/// Negated [`proportional_multicalibration_loss`].
pub fn proportional_multicalibration_score(
    model: &dyn ProbabilisticClassifier,
    features: ArrayView2<'_, f64>,
    y_true: &[f64],
    attributes: &ProtectedAttributes,
    groups: Option<&[String]>,
    protected: Option<&ProtectedAttributes>,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    let resolved = resolve_protected(attributes, groups, protected)?;
    let y_pred = predict(model, features, y_true)?;
    Ok(-proportional_multicalibration_loss(
        y_true, &y_pred, &resolved, cfg,
    )?)
}

/// Model-driven differential-calibration score: negated loss.
pub fn differential_calibration_score(
    model: &dyn ProbabilisticClassifier,
    features: ArrayView2<'_, f64>,
    y_true: &[f64],
    attributes: &ProtectedAttributes,
    groups: Option<&[String]>,
    protected: Option<&ProtectedAttributes>,
    cfg: &CalibrationConfig,
) -> Result<f64> {
    let resolved = resolve_protected(attributes, groups, protected)?;
    let y_pred = predict(model, features, y_true)?;
    Ok(-differential_calibration_loss(
        y_true, &y_pred, &resolved, cfg,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_attr(values: &[&str]) -> ProtectedAttributes {
        ProtectedAttributes::new(vec![(
            "g".to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        )])
        .unwrap()
    }

    #[test]
    fn perfectly_calibrated_predictions_have_zero_loss() {
        // Outcome mean equals predicted mean in every category
        let attrs = one_attr(&["a", "a", "a", "a"]);
        let y_true = [0.0, 1.0, 0.0, 1.0];
        let y_pred = [0.5, 0.5, 0.5, 0.5];
        let cfg = CalibrationConfig::multicalibration().with_gamma(0.0).with_alpha(0.0);
        let loss = multicalibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert!(loss.abs() < 1e-12);
    }

    #[test]
    fn multicalibration_picks_the_largest_gap() {
        // Group a, one stratum: predictions 0.9, outcomes 0.5 -> gap 0.4
        // Group b, same stratum: predictions 0.9, outcomes 1.0 -> gap 0.1
        let attrs = one_attr(&["a", "a", "b", "b"]);
        let y_true = [0.0, 1.0, 1.0, 1.0];
        let y_pred = [0.9, 0.9, 0.9, 0.9];
        let cfg = CalibrationConfig::multicalibration().with_gamma(0.0).with_alpha(0.0);
        let loss = multicalibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert!((loss - 0.4).abs() < 1e-12);
    }

    #[test]
    fn proportional_gap_divides_by_floored_prevalence() {
        let attrs = one_attr(&["a", "a"]);
        let y_true = [0.0, 1.0];
        let y_pred = [0.9, 0.9];
        let cfg = CalibrationConfig::proportional_multicalibration()
            .with_gamma(0.0)
            .with_alpha(0.0);
        // gap 0.4 / max(0.5, 0.1) = 0.8
        let loss = multicalibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert!((loss - 0.8).abs() < 1e-12);
    }

    #[test]
    fn proportional_zero_prevalence_without_floor_errors() {
        let attrs = one_attr(&["a", "a"]);
        let y_true = [0.0, 0.0];
        let y_pred = [0.9, 0.9];
        let cfg = CalibrationConfig::proportional_multicalibration()
            .with_gamma(0.0)
            .with_alpha(0.0)
            .with_rho(0.0);
        assert!(matches!(
            multicalibration_loss(&y_true, &y_pred, &attrs, &cfg),
            Err(Error::ZeroOutcomeRate { .. })
        ));
    }

    #[test]
    fn differential_calibration_log_ratio() {
        // Two groups sharing one stratum with outcome means 0.5 and
        // 0.25: |ln 0.5 - ln 0.25| = ln 2
        let attrs = one_attr(&["a", "a", "a", "a", "b", "b", "b", "b"]);
        let y_true = [1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let y_pred = [0.5; 8];
        let cfg = CalibrationConfig::differential();
        let loss = differential_calibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert!((loss - 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn differential_zero_rate_without_floor_errors() {
        let attrs = one_attr(&["a", "a", "b", "b"]);
        let y_true = [1.0, 1.0, 0.0, 0.0];
        let y_pred = [0.5; 4];
        let cfg = CalibrationConfig::differential();
        assert!(matches!(
            differential_calibration_loss(&y_true, &y_pred, &attrs, &cfg),
            Err(Error::ZeroOutcomeRate { .. })
        ));

        let floored = CalibrationConfig::differential().with_rho(0.05);
        let loss = differential_calibration_loss(&y_true, &y_pred, &attrs, &floored).unwrap();
        assert!((loss - (1.0f64.ln() - 0.05f64.ln()).abs()).abs() < 1e-12);
    }

    #[test]
    fn single_group_has_no_pairs() {
        let attrs = one_attr(&["a", "a"]);
        let y_true = [1.0, 0.0];
        let y_pred = [0.5, 0.5];
        let cfg = CalibrationConfig::differential();
        let loss = differential_calibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn scores_negate_losses() {
        use crate::model::ColumnModel;
        use ndarray::Array2;

        let attrs = one_attr(&["a", "a", "b", "b"]);
        let y_true = [0.0, 1.0, 1.0, 1.0];
        let x = Array2::from_shape_vec((4, 1), vec![0.9, 0.9, 0.9, 0.9]).unwrap();
        let model = ColumnModel::new(0);
        let cfg = CalibrationConfig::multicalibration().with_gamma(0.0).with_alpha(0.0);

        let score = multicalibration_score(
            &model,
            x.view(),
            &y_true,
            &attrs,
            None,
            Some(&attrs),
            &cfg,
        )
        .unwrap();
        let y_pred = [0.9, 0.9, 0.9, 0.9];
        let loss = multicalibration_loss(&y_true, &y_pred, &attrs, &cfg).unwrap();
        assert_eq!(score, -loss);
    }
}
