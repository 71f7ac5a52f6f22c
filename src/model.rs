//! Classifier interface consumed by the scorers.
//!
//! The audit engine never trains or owns a model. Scorers that operate
//! on a live classifier (rather than precomputed predictions) only need
//! positive-class probabilities, so that is the entire contract.

use ndarray::{Array1, ArrayView2};

/// A trained binary classifier exposing positive-class probabilities.
pub trait ProbabilisticClassifier {
    /// Probability of the positive class for each row of `features`.
    ///
    /// The returned vector has one entry per input row, each in [0, 1].
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Array1<f64>;
}

/// Reads the positive-class probability from one feature column.
///
/// Lets precomputed predictions flow through the model-driven scorers:
/// place the probabilities in a feature column and point a
/// `ColumnModel` at it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnModel {
    column: usize,
}

impl ColumnModel {
    pub fn new(column: usize) -> Self {
        Self { column }
    }
}

impl ProbabilisticClassifier for ColumnModel {
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        features.column(self.column).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn column_model_reads_its_column() {
        let x = Array2::from_shape_vec((3, 2), vec![0.1, 9.0, 0.5, 9.0, 0.9, 9.0]).unwrap();
        let model = ColumnModel::new(0);
        let proba = model.predict_proba(x.view());
        assert_eq!(proba.to_vec(), vec![0.1, 0.5, 0.9]);
    }
}
