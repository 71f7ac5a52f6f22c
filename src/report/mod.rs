//! Disparity-report driver.
//!
//! Runs the full audit over an [`AuditTable`]: overall predictive-bias
//! summary, the metric-by-grouping subgroup sweep, worst-group
//! selection per metric, and narrative/tabular rendering.
//!
//! # Example
//!
//! ```no_run
//! use equidad::data::read_audit_csv;
//! use equidad::report::{measure_disparity, ReportConfig};
//!
//! let table = read_audit_csv(std::path::Path::new("audit.csv")).unwrap();
//! let report = measure_disparity(&table, &ReportConfig::default()).unwrap();
//! println!("{}", report.render());
//! ```

mod table;

pub use table::Table;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::data::AuditTable;
use crate::error::{Error, Result};
use crate::groups::{GroupKey, Grouping};
use crate::metrics::base::{
    accuracy, average_precision, false_negative_rate, false_positive_rate, positivity, roc_auc,
};
use crate::metrics::{subgroup_loss, BaseMetric, HarmDirection, SubgroupOptions};

/// Marker prefixed to worst-group cells in rendered tables.
pub const WORST_MARK: &str = "**";

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Condition subgroup deviations on outcome composition.
    pub use_gamma: bool,
    /// Scale subgroup deviations by mean sample weight.
    pub weighted: bool,
    /// Metrics swept over both groupings.
    pub metrics: Vec<BaseMetric>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            use_gamma: true,
            weighted: true,
            metrics: vec![
                BaseMetric::FalseNegativeRate,
                BaseMetric::FalsePositiveRate,
                BaseMetric::BrierScore,
                BaseMetric::Positivity,
            ],
        }
    }
}

impl ReportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable outcome-conditioned weighting.
    pub fn without_gamma(mut self) -> Self {
        self.use_gamma = false;
        self
    }

    /// Ignore sample weights.
    pub fn without_weights(mut self) -> Self {
        self.weighted = false;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<BaseMetric>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// One pivoted row of the disparity table: a group's signed deviation
/// per metric.
#[derive(Debug, Clone, Serialize)]
pub struct DisparityRow {
    pub grouping: Grouping,
    pub group: GroupKey,
    /// Metric name -> signed deviation.
    pub signed: BTreeMap<String, f64>,
    /// Metric name -> raw percentage difference (None for a zero
    /// baseline).
    pub raw_pct: BTreeMap<String, Option<f64>>,
}

/// The group flagged worst for one metric.
#[derive(Debug, Clone, Serialize)]
pub struct WorstGroup {
    pub metric: String,
    pub group: GroupKey,
    pub signed_value: f64,
    pub raw_value_pct: Option<f64>,
}

/// Full audit output.
#[derive(Debug, Clone, Serialize)]
pub struct DisparityReport {
    /// Whole-population predictive-bias measures.
    pub summary: Vec<(String, f64)>,
    pub attribute_names: Vec<String>,
    /// Metric column order for tabulation.
    pub metric_names: Vec<String>,
    /// Rows sorted by group key; marginal and intersectional rows
    /// share the uniform padded key shape.
    pub rows: Vec<DisparityRow>,
    pub worst: Vec<WorstGroup>,
}

/// Run the audit: overall summary, subgroup sweep, worst-group
/// selection.
///
/// Each metric-by-grouping pair is evaluated independently and merged
/// by group key, so evaluation order carries no semantic weight.
///
/// # Errors
///
/// Propagates `DegenerateInput` from the ranked summary metrics when
/// the dataset holds a single outcome class, and any evaluator error.
pub fn measure_disparity(table: &AuditTable, cfg: &ReportConfig) -> Result<DisparityReport> {
    let attrs = table.attributes();
    let y_true = table.outcomes();
    let proba = table.predictions();
    let labels = table.labels();

    let summary = vec![
        ("AUROC".to_string(), roc_auc(y_true, proba)?),
        ("AUPRC".to_string(), average_precision(y_true, proba)?),
        ("Positivity Rate".to_string(), positivity(y_true, proba)),
        ("FPR".to_string(), false_positive_rate(y_true, labels)),
        ("FNR".to_string(), false_negative_rate(y_true, labels)),
        ("Accuracy".to_string(), accuracy(y_true, labels)),
    ];

    let metric_names: Vec<String> = cfg.metrics.iter().map(|m| m.name().to_string()).collect();

    let mut merged: BTreeMap<GroupKey, DisparityRow> = BTreeMap::new();
    for metric in &cfg.metrics {
        for grouping in [Grouping::Marginal, Grouping::Intersectional] {
            let mut opts = SubgroupOptions::new().with_grouping(grouping);
            if !cfg.use_gamma {
                opts = opts.without_gamma();
            }
            if cfg.weighted {
                opts = opts.with_weights(table.weights());
            }
            let outcome = subgroup_loss(y_true, proba, attrs, *metric, &opts)?;
            for record in outcome.records {
                let row = merged
                    .entry(record.group.clone())
                    .or_insert_with(|| DisparityRow {
                        grouping,
                        group: record.group.clone(),
                        signed: BTreeMap::new(),
                        raw_pct: BTreeMap::new(),
                    });
                row.signed.insert(outcome.metric.clone(), record.signed_value);
                row.raw_pct.insert(outcome.metric.clone(), record.raw_value_pct);
            }
        }
    }
    let rows: Vec<DisparityRow> = merged.into_values().collect();

    let mut worst = Vec::new();
    for (metric, name) in cfg.metrics.iter().zip(&metric_names) {
        if let Some((row, signed)) = select_worst(metric.harm_direction(), &rows, name) {
            worst.push(WorstGroup {
                metric: name.clone(),
                group: row.group.clone(),
                signed_value: signed,
                raw_value_pct: row.raw_pct.get(name).copied().flatten(),
            });
        }
    }

    Ok(DisparityReport {
        summary,
        attribute_names: attrs.names().to_vec(),
        metric_names,
        rows,
        worst,
    })
}

/// Pick the worst row for one metric column: the extreme signed value
/// in the metric's harm direction. Strict comparisons keep the first
/// row in table order on ties.
fn select_worst<'a>(
    direction: HarmDirection,
    rows: &'a [DisparityRow],
    metric: &str,
) -> Option<(&'a DisparityRow, f64)> {
    let mut selected: Option<(&DisparityRow, f64)> = None;
    for row in rows {
        let Some(&signed) = row.signed.get(metric) else {
            continue;
        };
        let replace = match selected {
            None => true,
            Some((_, current)) => match direction {
                HarmDirection::Min => signed < current,
                HarmDirection::Max => signed > current,
            },
        };
        if replace {
            selected = Some((row, signed));
        }
    }
    selected
}

fn heading(out: &mut String, title: &str) {
    let bar = "=".repeat(40);
    let _ = writeln!(out, "{bar}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{bar}");
}

impl DisparityReport {
    /// Render the three report sections as text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        heading(&mut out, "Overall Performance");
        let _ = writeln!(out, "\tMeasures of predictive bias on the whole population.");
        let mut summary_table =
            Table::new(self.summary.iter().map(|(name, _)| name.clone()).collect())
                .align_right_from(0);
        summary_table.add_row(
            self.summary
                .iter()
                .map(|(_, value)| format!("{value:.3}"))
                .collect(),
        );
        out.push_str(&summary_table.render());

        heading(&mut out, "Subgroup Fairness Violations");
        let _ = writeln!(
            out,
            "\tDeviation in performance for marginal and intersectional groups."
        );
        let _ = writeln!(
            out,
            "\tDeviations are weighted by group prevalence to stabilize small-sample estimates."
        );
        let worst_cells: BTreeSet<(&str, &GroupKey)> = self
            .worst
            .iter()
            .map(|w| (w.metric.as_str(), &w.group))
            .collect();
        let headers: Vec<String> = self
            .attribute_names
            .iter()
            .cloned()
            .chain(self.metric_names.iter().cloned())
            .collect();
        let mut violations =
            Table::new(headers).align_right_from(self.attribute_names.len());
        for row in &self.rows {
            let mut cells: Vec<String> = row.group.values().map(str::to_string).collect();
            for name in &self.metric_names {
                let mut cell = match row.signed.get(name) {
                    Some(signed) => format!("{signed:.3}"),
                    None => String::new(),
                };
                if worst_cells.contains(&(name.as_str(), &row.group)) {
                    cell = format!("{WORST_MARK}{cell}");
                }
                cells.push(cell);
            }
            violations.add_row(cells);
        }
        out.push_str(&violations.render());

        let _ = writeln!(out, "Subgroups with Largest Deviations");
        let _ = writeln!(out, "{}", "-".repeat(20));
        for worst in &self.worst {
            let _ = writeln!(out, "{}", worst.metric);
            let _ = writeln!(out, "{}", "-".repeat(10));
            let _ = writeln!(out, "- Subgroup: {}", worst.group.label());
            match worst.raw_value_pct {
                Some(pct) => {
                    let direction = if worst.signed_value > 0.0 {
                        "higher"
                    } else {
                        "lower"
                    };
                    let _ = writeln!(
                        out,
                        "- {} is {pct:.1} % {direction} among this group than the population.\n",
                        worst.metric
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "- {} deviates from a zero population baseline for this group.\n",
                        worst.metric
                    );
                }
            }
        }

        out
    }

    /// Pivoted signed-deviation table as CSV: attribute columns then
    /// one column per metric.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self
            .attribute_names
            .iter()
            .cloned()
            .chain(self.metric_names.iter().cloned())
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for row in &self.rows {
            let mut cells: Vec<String> = row.group.values().map(str::to_string).collect();
            for name in &self.metric_names {
                cells.push(match row.signed.get(name) {
                    Some(signed) => format!("{signed}"),
                    None => String::new(),
                });
            }
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// Full report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
