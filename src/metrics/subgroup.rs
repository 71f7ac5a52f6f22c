//! Per-subgroup deviation evaluation.
//!
//! For a chosen base metric, computes the population baseline and each
//! group's signed and absolute deviation from it, with optional
//! outcome-conditioned weighting and sample-weight scaling.
//!
//! # Example
//!
//! ```
//! use equidad::data::ProtectedAttributes;
//! use equidad::metrics::{subgroup_loss, BaseMetric, SubgroupOptions};
//! use equidad::groups::Grouping;
//!
//! let attrs = ProtectedAttributes::new(vec![(
//!     "group".to_string(),
//!     vec!["a".to_string(), "a".to_string(), "b".to_string(), "b".to_string()],
//! )])
//! .unwrap();
//! let outcome = subgroup_loss(
//!     &[0.0, 1.0, 0.0, 1.0],
//!     &[0.1, 0.9, 0.4, 0.6],
//!     &attrs,
//!     BaseMetric::FalsePositiveRate,
//!     &SubgroupOptions::new().with_grouping(Grouping::Intersectional),
//! )
//! .unwrap();
//! assert_eq!(outcome.records.len(), 2);
//! ```

use ndarray::ArrayView2;
use serde::Serialize;

use super::BaseMetric;
use crate::data::ProtectedAttributes;
use crate::error::{Error, Result};
use crate::groups::{group_indices, GroupKey, Grouping, ANY_VALUE};
use crate::model::ProbabilisticClassifier;

/// Options for the subgroup evaluator.
#[derive(Debug, Clone)]
pub struct SubgroupOptions<'a> {
    /// How to partition the population.
    pub grouping: Grouping,
    /// Condition deviations on the group's outcome composition.
    pub use_gamma: bool,
    /// Per-individual sample weights; deviations are scaled by the
    /// group's mean weight.
    pub weights: Option<&'a [f64]>,
}

impl Default for SubgroupOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> SubgroupOptions<'a> {
    pub fn new() -> Self {
        Self {
            grouping: Grouping::Intersectional,
            use_gamma: true,
            weights: None,
        }
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Disable outcome-conditioned weighting.
    pub fn without_gamma(mut self) -> Self {
        self.use_gamma = false;
        self
    }

    pub fn with_weights(mut self, weights: &'a [f64]) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// One group's deviation from the population baseline.
///
/// Immutable once computed; the report layer annotates worst groups in
/// its own structures rather than mutating records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationRecord {
    /// Uniform key shape: one `(attribute, value)` pair per protected
    /// attribute, with `"any"` for attributes a marginal group leaves
    /// unconstrained.
    pub group: GroupKey,
    /// Absolute deviation after conditioning and weighting.
    pub value: f64,
    /// Signed deviation after conditioning and weighting.
    pub signed_value: f64,
    /// Unweighted `raw_loss - base_loss`.
    pub raw_value: f64,
    /// `|raw_value| / base_loss * 100`; `None` when the baseline is 0
    /// (the percentage is undefined, signalled explicitly rather than
    /// as NaN).
    pub raw_value_pct: Option<f64>,
}

/// Result of one subgroup evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgroupOutcome {
    pub metric: String,
    pub grouping: Grouping,
    pub base_loss: f64,
    pub records: Vec<DeviationRecord>,
    /// Largest absolute deviation seen; 0 when every group matches the
    /// baseline.
    pub max_deviation: f64,
    /// Group holding `max_deviation`; `None` when all deviations are 0.
    /// Ties keep the first-seen group.
    pub max_group: Option<GroupKey>,
}

fn gather(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Expand a group key to the uniform shape: every attribute present in
/// column order, unconstrained attributes as `"any"`.
fn expand_key(key: &GroupKey, names: &[String]) -> GroupKey {
    GroupKey::new(
        names
            .iter()
            .map(|name| {
                let value = key
                    .pairs()
                    .iter()
                    .find(|(attr, _)| attr == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| ANY_VALUE.to_string());
                (name.clone(), value)
            })
            .collect(),
    )
}

/// Evaluate per-group deviations of `metric` from the population
/// baseline.
///
/// With `use_gamma`, the signed deviation is multiplied by a
/// metric-specific conditioning factor that damps deviations driven by
/// outcome sparsity in small groups: `1 - positive fraction` for FPR,
/// the positive fraction for FNR, and the group's population fraction
/// otherwise. Sample weights, when given, additionally scale by the
/// group's mean weight.
///
/// # Errors
///
/// Returns `LengthMismatch` if outcomes, predictions, or weights
/// disagree with the attribute table's row count.
pub fn subgroup_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    metric: BaseMetric,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    let n = attrs.len();
    for len in [y_true.len(), y_pred.len()] {
        if len != n {
            return Err(Error::LengthMismatch {
                expected: n,
                got: len,
            });
        }
    }
    if let Some(w) = opts.weights {
        if w.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                got: w.len(),
            });
        }
    }

    let base_loss = metric.compute(y_true, y_pred);
    let mut records = Vec::new();
    let mut max_deviation = 0.0;
    let mut max_group = None;

    for (key, indices) in group_indices(attrs, opts.grouping) {
        let group_true = gather(y_true, &indices);
        let group_pred = gather(y_pred, &indices);
        let raw_loss = metric.compute(&group_true, &group_pred);
        let mut signed = raw_loss - base_loss;

        if opts.use_gamma {
            let factor = match metric {
                BaseMetric::FalsePositiveRate => 1.0 - mean(&group_true),
                BaseMetric::FalseNegativeRate => mean(&group_true),
                _ => indices.len() as f64 / n as f64,
            };
            signed *= factor;
        }
        if let Some(weights) = opts.weights {
            signed *= mean(&gather(weights, &indices));
        }

        let raw = raw_loss - base_loss;
        let raw_pct = if base_loss == 0.0 {
            None
        } else {
            Some(raw.abs() / base_loss * 100.0)
        };
        let group = expand_key(&key, attrs.names());

        let abs = signed.abs();
        if abs > max_deviation {
            max_deviation = abs;
            max_group = Some(group.clone());
        }

        records.push(DeviationRecord {
            group,
            value: abs,
            signed_value: signed,
            raw_value: raw,
            raw_value_pct: raw_pct,
        });
    }

    Ok(SubgroupOutcome {
        metric: metric.name().to_string(),
        grouping: opts.grouping,
        base_loss,
        records,
        max_deviation,
        max_group,
    })
}

/// Subgroup FPR deviations.
pub fn subgroup_fpr_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    subgroup_loss(y_true, y_pred, attrs, BaseMetric::FalsePositiveRate, opts)
}

/// Subgroup FNR deviations.
pub fn subgroup_fnr_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    subgroup_loss(y_true, y_pred, attrs, BaseMetric::FalseNegativeRate, opts)
}

/// Subgroup Brier-score deviations.
pub fn subgroup_brier_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    subgroup_loss(y_true, y_pred, attrs, BaseMetric::BrierScore, opts)
}

/// Subgroup positivity deviations.
pub fn subgroup_positivity_loss(
    y_true: &[f64],
    y_pred: &[f64],
    attrs: &ProtectedAttributes,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    subgroup_loss(y_true, y_pred, attrs, BaseMetric::Positivity, opts)
}

/// Resolve the grouping columns for a model-driven scorer.
///
/// Exactly one of `groups` (column names selected from `attributes`)
/// or `protected` (a standalone table) must be supplied.
pub(crate) fn resolve_protected(
    attributes: &ProtectedAttributes,
    groups: Option<&[String]>,
    protected: Option<&ProtectedAttributes>,
) -> Result<ProtectedAttributes> {
    match (groups, protected) {
        (Some(_), Some(_)) => Err(Error::ConfigError(
            "cannot supply both groups and a protected table".to_string(),
        )),
        (None, None) => Err(Error::ConfigError(
            "either groups or a protected table must be supplied".to_string(),
        )),
        (Some(names), None) => attributes.select(names),
        (None, Some(table)) => Ok(table.clone()),
    }
}

/// Model-driven subgroup scorer: predicts probabilities with `model`
/// and evaluates `metric` deviations over the resolved grouping.
///
/// # Errors
///
/// `ConfigError` unless exactly one of `groups`/`protected` is given;
/// `MissingColumn` for an unknown group name; `LengthMismatch` if the
/// feature matrix disagrees with `y_true`.
pub fn subgroup_scorer(
    model: &dyn ProbabilisticClassifier,
    features: ArrayView2<'_, f64>,
    y_true: &[f64],
    metric: BaseMetric,
    attributes: &ProtectedAttributes,
    groups: Option<&[String]>,
    protected: Option<&ProtectedAttributes>,
    opts: &SubgroupOptions<'_>,
) -> Result<SubgroupOutcome> {
    if features.nrows() != y_true.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            got: features.nrows(),
        });
    }
    let resolved = resolve_protected(attributes, groups, protected)?;
    let y_pred = model.predict_proba(features).to_vec();
    subgroup_loss(y_true, &y_pred, &resolved, metric, opts)
}
