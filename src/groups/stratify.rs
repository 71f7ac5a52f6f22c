//! Risk stratification: interval binning and small-sample filtering.

use std::collections::BTreeMap;

use super::{group_indices, GroupKey, Grouping};
use crate::data::ProtectedAttributes;
use crate::error::{Error, Result};

/// Ordered bin edges over predicted-risk values.
///
/// Assignment follows right-closed intervals with an inclusive lowest
/// edge: interval `i > 0` is `(edges[i], edges[i+1]]`, interval `0` is
/// `[edges[0], edges[1]]`. Scores outside the edge range are left
/// unassigned and drop out of stratification.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBins {
    edges: Vec<f64>,
    bin_count: usize,
}

impl RiskBins {
    /// Evenly spaced edges from `1/n_bins` to `1.0`, with the first
    /// edge forced to `0.0` so the lowest interval covers exactly 0.
    ///
    /// With the default `n_bins = 10` this produces the 9 intervals
    /// `[0, 0.2], (0.2, 0.3], ..., (0.9, 1]`; the lowest interval is
    /// twice as wide as the rest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBins` for `n_bins < 2` (fewer than two edges
    /// define no interval).
    pub fn equal_width(n_bins: usize) -> Result<Self> {
        if n_bins < 2 {
            return Err(Error::InvalidBins(format!(
                "need at least 2 bin edges, got {n_bins}"
            )));
        }
        let mut edges: Vec<f64> = (1..=n_bins).map(|i| i as f64 / n_bins as f64).collect();
        edges[0] = 0.0;
        Ok(Self {
            edges,
            bin_count: n_bins,
        })
    }

    /// Explicit edges, which must be strictly increasing.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidBins(format!(
                "need at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidBins(
                "bin edges must be strictly increasing".to_string(),
            ));
        }
        let bin_count = edges.len();
        Ok(Self { edges, bin_count })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of intervals (`edges.len() - 1`).
    pub fn n_intervals(&self) -> usize {
        self.edges.len() - 1
    }

    /// Divisor used by the category-level support filter: the
    /// requested bin count for default edges, `edges.len()` for
    /// explicit edges.
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Interval index for a score, or `None` if it lies outside the
    /// edge range.
    pub fn interval_of(&self, score: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if score.is_nan() || score < first || score > last {
            return None;
        }
        if score <= self.edges[1] {
            return Some(0);
        }
        // first edge >= score closes the interval containing it
        let i = self.edges.partition_point(|&e| e < score);
        Some(i - 1)
    }

    /// Human-readable interval label, e.g. `(0.2, 0.3]`.
    pub fn label(&self, interval: usize) -> String {
        let lo = self.edges[interval];
        let hi = self.edges[interval + 1];
        if interval == 0 {
            format!("[{lo}, {hi}]")
        } else {
            format!("({lo}, {hi}]")
        }
    }
}

/// Intersection of one group and one risk stratum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryKey {
    pub group: GroupKey,
    pub interval: usize,
}

/// Retained `(group, interval, indices)` cells in group-major order.
///
/// Applies the two independent small-sample filters. The comparison
/// operators are part of the contract: the group-level filter drops on
/// `<=`, the category-level filter keeps on strict `>`.
fn retained_cells(
    attrs: &ProtectedAttributes,
    scores: &[f64],
    grouping: Grouping,
    bins: &RiskBins,
    alpha: f64,
    gamma: f64,
) -> Result<Vec<(GroupKey, usize, Vec<usize>)>> {
    if scores.len() != attrs.len() {
        return Err(Error::LengthMismatch {
            expected: attrs.len(),
            got: scores.len(),
        });
    }
    let n = attrs.len() as f64;
    let min_group = gamma * n;
    let min_cell = gamma * alpha * n / bins.bin_count() as f64;

    let mut out = Vec::new();
    for (key, indices) in group_indices(attrs, grouping) {
        if indices.len() as f64 <= min_group {
            continue;
        }
        let mut by_interval: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &row in &indices {
            if let Some(interval) = bins.interval_of(scores[row]) {
                by_interval.entry(interval).or_default().push(row);
            }
        }
        for (interval, rows) in by_interval {
            if rows.len() as f64 > min_cell {
                out.push((key.clone(), interval, rows));
            }
        }
    }
    Ok(out)
}

/// Stratified categories keyed by `(group, interval)`, category-major.
///
/// Used by the multicalibration evaluator; honors the grouping mode.
pub fn categorize(
    attrs: &ProtectedAttributes,
    scores: &[f64],
    grouping: Grouping,
    bins: &RiskBins,
    alpha: f64,
    gamma: f64,
) -> Result<Vec<(CategoryKey, Vec<usize>)>> {
    Ok(retained_cells(attrs, scores, grouping, bins, alpha, gamma)?
        .into_iter()
        .map(|(group, interval, rows)| (CategoryKey { group, interval }, rows))
        .collect())
}

/// Stratified categories regrouped per interval, groups in the stable
/// indexer order within each stratum.
///
/// Used by the differential-calibration evaluator, whose adjacent-pair
/// walk depends on this order.
pub fn stratify_groups(
    attrs: &ProtectedAttributes,
    scores: &[f64],
    grouping: Grouping,
    bins: &RiskBins,
    alpha: f64,
    gamma: f64,
) -> Result<Vec<(usize, Vec<(GroupKey, Vec<usize>)>)>> {
    let mut strata: BTreeMap<usize, Vec<(GroupKey, Vec<usize>)>> = BTreeMap::new();
    for (group, interval, rows) in retained_cells(attrs, scores, grouping, bins, alpha, gamma)? {
        strata.entry(interval).or_default().push((group, rows));
    }
    Ok(strata.into_iter().collect())
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
    fn default_edges_force_zero_first_edge() {
        let bins = RiskBins::equal_width(10).unwrap();
        assert_eq!(bins.edges()[0], 0.0);
        assert_eq!(bins.edges()[1], 0.2);
        assert_eq!(*bins.edges().last().unwrap(), 1.0);
        assert_eq!(bins.n_intervals(), 9);
        assert_eq!(bins.bin_count(), 10);
    }

    #[test]
    fn lowest_interval_includes_zero() {
        let bins = RiskBins::equal_width(10).unwrap();
        assert_eq!(bins.interval_of(0.0), Some(0));
        assert_eq!(bins.interval_of(0.2), Some(0));
        assert_eq!(bins.interval_of(0.20001), Some(1));
    }

    #[test]
    fn every_unit_score_lands_in_exactly_one_interval() {
        let bins = RiskBins::equal_width(10).unwrap();
        for i in 0..=1000 {
            let score = i as f64 / 1000.0;
            let interval = bins.interval_of(score).unwrap();
            assert!(interval < bins.n_intervals());
            let lo = bins.edges()[interval];
            let hi = bins.edges()[interval + 1];
            if interval == 0 {
                assert!(score >= lo && score <= hi);
            } else {
                assert!(score > lo && score <= hi);
            }
        }
    }

    #[test]
    fn out_of_range_scores_are_unassigned() {
        let bins = RiskBins::from_edges(vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(bins.interval_of(-0.1), None);
        assert_eq!(bins.interval_of(1.1), None);
        assert_eq!(bins.interval_of(f64::NAN), None);
    }

    #[test]
    fn explicit_edges_must_increase() {
        assert!(RiskBins::from_edges(vec![0.0, 0.5, 0.5]).is_err());
        assert!(RiskBins::from_edges(vec![1.0]).is_err());
    }

    #[test]
    fn explicit_edges_use_edge_count_as_filter_divisor() {
        let bins = RiskBins::from_edges(vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(bins.bin_count(), 3);
        assert_eq!(bins.n_intervals(), 2);
    }

    #[test]
    fn group_filter_drops_on_non_strict_comparison() {
        // 10 rows, group "b" holds exactly 2 -> fraction 0.2.
        // gamma = 0.2 must drop it (<=), gamma just below keeps it.
        let attrs = one_attr(&["a", "a", "a", "a", "a", "a", "a", "a", "b", "b"]);
        let scores = vec![0.1; 10];
        let bins = RiskBins::from_edges(vec![0.0, 0.5, 1.0]).unwrap();

        let at_gamma =
            categorize(&attrs, &scores, Grouping::Intersectional, &bins, 0.0, 0.2).unwrap();
        assert!(at_gamma.iter().all(|(k, _)| k.group.pairs()[0].1 != "b"));

        let below_gamma =
            categorize(&attrs, &scores, Grouping::Intersectional, &bins, 0.0, 0.19).unwrap();
        assert!(below_gamma.iter().any(|(k, _)| k.group.pairs()[0].1 == "b"));
    }

    #[test]
    fn category_filter_keeps_on_strict_comparison() {
        // One group of 8; min cell size = gamma*alpha*n/bin_count.
        // Pick thresholds so a 4-row cell sits exactly at the boundary:
        // gamma=0.5, alpha=3.0, n=8, bin_count=3 -> min_cell = 4.0.
        let attrs = one_attr(&["a"; 8]);
        let scores = vec![0.1, 0.1, 0.1, 0.1, 0.9, 0.9, 0.9, 0.9];
        let bins = RiskBins::from_edges(vec![0.0, 0.5, 1.0]).unwrap();
        let cells =
            categorize(&attrs, &scores, Grouping::Intersectional, &bins, 3.0, 0.5).unwrap();
        // Each interval holds exactly 4 rows; 4.0 > 4.0 is false, so all drop.
        assert!(cells.is_empty());

        let cells =
            categorize(&attrs, &scores, Grouping::Intersectional, &bins, 2.9, 0.5).unwrap();
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn category_count_is_monotone_in_alpha_and_gamma() {
        let values: Vec<&str> = (0..40).map(|i| if i % 4 == 0 { "b" } else { "a" }).collect();
        let attrs = one_attr(&values);
        let scores: Vec<f64> = (0..40).map(|i| (i as f64 + 0.5) / 40.0).collect();
        let bins = RiskBins::equal_width(10).unwrap();

        let mut last = usize::MAX;
        for gamma in [0.0, 0.05, 0.1, 0.3] {
            let count = categorize(&attrs, &scores, Grouping::Intersectional, &bins, 0.5, gamma)
                .unwrap()
                .len();
            assert!(count <= last);
            last = count;
        }

        let mut last = usize::MAX;
        for alpha in [0.0, 0.5, 2.0, 8.0] {
            let count = categorize(&attrs, &scores, Grouping::Intersectional, &bins, alpha, 0.05)
                .unwrap()
                .len();
            assert!(count <= last);
            last = count;
        }
    }

    #[test]
    fn stratify_groups_is_interval_major() {
        let attrs = one_attr(&["a", "a", "b", "b"]);
        let scores = vec![0.1, 0.9, 0.1, 0.9];
        let bins = RiskBins::from_edges(vec![0.0, 0.5, 1.0]).unwrap();
        let strata =
            stratify_groups(&attrs, &scores, Grouping::Intersectional, &bins, 0.0, 0.0).unwrap();

        assert_eq!(strata.len(), 2);
        let (interval, groups) = &strata[0];
        assert_eq!(*interval, 0);
        let names: Vec<&str> = groups.iter().map(|(k, _)| k.pairs()[0].1.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
