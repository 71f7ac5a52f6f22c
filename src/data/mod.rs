//! Audit population table and protected-attribute columns.
//!
//! An [`AuditTable`] holds one row per individual: the true binary
//! outcome, the model's predicted probability, the derived hard label,
//! a sample weight, and the demographic columns the audit groups over.
//! All validation happens at construction so downstream evaluators can
//! assume well-formed columns.
//!
//! # Example
//!
//! ```
//! use equidad::data::{AuditTable, ProtectedAttributes};
//!
//! let attrs = ProtectedAttributes::new(vec![(
//!     "group".to_string(),
//!     vec!["a".to_string(), "b".to_string()],
//! )])
//! .unwrap();
//! let table = AuditTable::new(
//!     vec![1.0, 0.0],
//!     vec![0.8, 0.3],
//!     vec![1.0, 0.0],
//!     vec![1.0, 1.0],
//!     attrs,
//! )
//! .unwrap();
//! assert_eq!(table.len(), 2);
//! ```

mod csv;

pub use csv::{parse_audit_csv, read_audit_csv};

use crate::error::{Error, Result};

/// Named categorical columns over a population, in a fixed order.
///
/// The column order defines the attribute order used by intersectional
/// group keys. Every individual has a value for every attribute; a
/// missing value cannot be represented, so it cannot be silently
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedAttributes {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    rows: usize,
}

impl ProtectedAttributes {
    /// Build from `(name, values)` column pairs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no columns are given or a name repeats,
    /// and `LengthMismatch` if the columns differ in length.
    pub fn new(columns: Vec<(String, Vec<String>)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::ConfigError(
                "at least one protected attribute column is required".to_string(),
            ));
        }
        let rows = columns[0].1.len();
        let mut names = Vec::with_capacity(columns.len());
        let mut cols = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != rows {
                return Err(Error::LengthMismatch {
                    expected: rows,
                    got: values.len(),
                });
            }
            if names.contains(&name) {
                return Err(Error::ConfigError(format!(
                    "duplicate attribute column: {name}"
                )));
            }
            names.push(name);
            cols.push(values);
        }
        Ok(Self {
            names,
            columns: cols,
            rows,
        })
    }

    /// Number of individuals.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the population is empty.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Attribute names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of attribute columns.
    pub fn n_attributes(&self) -> usize {
        self.names.len()
    }

    /// Values of one attribute column.
    ///
    /// # Errors
    ///
    /// Returns `MissingColumn` if `name` is not an attribute.
    pub fn column(&self, name: &str) -> Result<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Value of attribute `attr` (column index) for individual `row`.
    pub fn value(&self, attr: usize, row: usize) -> &str {
        &self.columns[attr][row]
    }

    /// A new table restricted to the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `MissingColumn` on any unknown name.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push((name.clone(), self.column(name)?.to_vec()));
        }
        Self::new(columns)
    }
}

/// In-memory audit dataset: one row per individual.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditTable {
    outcomes: Vec<f64>,
    predictions: Vec<f64>,
    labels: Vec<f64>,
    weights: Vec<f64>,
    attributes: ProtectedAttributes,
}

impl AuditTable {
    /// Build a validated audit table.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if any column disagrees with the
    /// attribute table's row count, and `InvalidValue` if an outcome is
    /// not 0/1, a prediction falls outside [0, 1], or a weight is
    /// negative or non-finite.
    pub fn new(
        outcomes: Vec<f64>,
        predictions: Vec<f64>,
        labels: Vec<f64>,
        weights: Vec<f64>,
        attributes: ProtectedAttributes,
    ) -> Result<Self> {
        let rows = attributes.len();
        for col in [&outcomes, &predictions, &labels, &weights] {
            if col.len() != rows {
                return Err(Error::LengthMismatch {
                    expected: rows,
                    got: col.len(),
                });
            }
        }
        for &y in &outcomes {
            if y != 0.0 && y != 1.0 {
                return Err(Error::InvalidValue(format!(
                    "binary outcome must be 0 or 1, got {y}"
                )));
            }
        }
        for &p in &predictions {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidValue(format!(
                    "prediction must lie in [0, 1], got {p}"
                )));
            }
        }
        for &w in &weights {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidValue(format!(
                    "sample weight must be non-negative, got {w}"
                )));
            }
        }
        Ok(Self {
            outcomes,
            predictions,
            labels,
            weights,
            attributes,
        })
    }

    /// Number of individuals.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// True binary outcomes (0/1).
    pub fn outcomes(&self) -> &[f64] {
        &self.outcomes
    }

    /// Predicted positive-class probabilities.
    pub fn predictions(&self) -> &[f64] {
        &self.predictions
    }

    /// Hard predicted labels.
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Per-individual sample weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The demographic columns.
    pub fn attributes(&self) -> &ProtectedAttributes {
        &self.attributes
    }
}
