//! Subgroup enumeration and risk stratification.
//!
//! This module partitions an audit population into demographic
//! subgroups and intersects them with predicted-risk strata:
//!
//! - **indexer**: marginal and intersectional group index sets
//! - **stratify**: risk binning plus the two small-sample filters that
//!   drop statistically unreliable strata

mod indexer;
mod stratify;


pub use indexer::group_indices;
pub use stratify::{categorize, stratify_groups, CategoryKey, RiskBins};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder value for attributes left unconstrained by a marginal
/// group key.
pub const ANY_VALUE: &str = "any";

/// How the population is partitioned into subgroups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// One attribute at a time, others unconstrained. Groups from
    /// different attributes overlap by design.
    Marginal,
    /// Full cross-product of attribute values; index sets partition
    /// the population.
    Intersectional,
}

impl Grouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grouping::Marginal => "marginal",
            Grouping::Intersectional => "intersectional",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "marginal" => Ok(Grouping::Marginal),
            "intersectional" => Ok(Grouping::Intersectional),
            other => Err(Error::ConfigError(format!("unknown grouping: {other}"))),
        }
    }
}

/// Identifies a subgroup: ordered `(attribute, value)` pairs.
///
/// Intersectional keys carry one pair per protected attribute, in the
/// fixed attribute order. Marginal keys carry a single pair; the
/// report layer expands them with [`ANY_VALUE`] placeholders so both
/// shapes tabulate uniformly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey(Vec<(String, String)>);

impl GroupKey {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// The `(attribute, value)` pairs in attribute order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Attribute values in attribute order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }

    /// `attr=value` pairs joined by commas, skipping placeholders.
    pub fn label(&self) -> String {
        let constrained: Vec<String> = self
            .0
            .iter()
            .filter(|(_, v)| v != ANY_VALUE)
            .map(|(a, v)| format!("{a}={v}"))
            .collect();
        constrained.join(",")
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_round_trips_through_str() {
        for g in [Grouping::Marginal, Grouping::Intersectional] {
            assert_eq!(g.as_str().parse::<Grouping>().unwrap(), g);
        }
        assert!("both".parse::<Grouping>().is_err());
    }

    #[test]
    fn label_skips_placeholders() {
        let key = GroupKey::new(vec![
            ("race".to_string(), "b".to_string()),
            ("sex".to_string(), ANY_VALUE.to_string()),
        ]);
        assert_eq!(key.label(), "race=b");
    }
}
