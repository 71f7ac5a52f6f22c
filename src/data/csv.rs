//! Delimited-text ingest for audit datasets.
//!
//! Minimal comma-separated parsing: one header row naming the columns,
//! no quoting (field values must not contain commas). The four required
//! columns are matched case-insensitively; every remaining column is
//! treated as a demographic attribute, in file order.

use std::fs;
use std::path::Path;

use super::{AuditTable, ProtectedAttributes};
use crate::error::{Error, Result};

/// Required column headers, lowercase.
const PREDICTION_COL: &str = "model prediction";
const OUTCOME_COL: &str = "binary outcome";
const LABEL_COL: &str = "model label";
const WEIGHT_COL: &str = "sample weights";

/// Read an audit dataset from a CSV file.
pub fn read_audit_csv(path: &Path) -> Result<AuditTable> {
    let text = fs::read_to_string(path)?;
    parse_audit_csv(&text)
}

/// Parse an audit dataset from CSV text.
///
/// # Errors
///
/// Returns `MissingColumn` if a required column is absent,
/// `ConfigError` if no demographic columns remain, `Parse` on a
/// malformed numeric cell, and `LengthMismatch` on a short row.
pub fn parse_audit_csv(text: &str) -> Result<AuditTable> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| Error::Parse("empty dataset".to_string()))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();

    let required = [OUTCOME_COL, PREDICTION_COL, LABEL_COL, WEIGHT_COL];
    let find = |name: &str| -> Result<usize> {
        columns
            .iter()
            .position(|c| c.to_lowercase() == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let outcome_idx = find(OUTCOME_COL)?;
    let prediction_idx = find(PREDICTION_COL)?;
    let label_idx = find(LABEL_COL)?;
    let weight_idx = find(WEIGHT_COL)?;

    let demographic_idx: Vec<usize> = (0..columns.len())
        .filter(|i| {
            !required.contains(&columns[*i].to_lowercase().as_str())
        })
        .collect();
    if demographic_idx.is_empty() {
        return Err(Error::ConfigError(
            "no demographic columns found".to_string(),
        ));
    }

    let mut outcomes = Vec::new();
    let mut predictions = Vec::new();
    let mut labels = Vec::new();
    let mut weights = Vec::new();
    let mut demographics: Vec<Vec<String>> = vec![Vec::new(); demographic_idx.len()];

    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            return Err(Error::LengthMismatch {
                expected: columns.len(),
                got: fields.len(),
            });
        }
        outcomes.push(parse_cell(fields[outcome_idx], columns[outcome_idx])?);
        predictions.push(parse_cell(fields[prediction_idx], columns[prediction_idx])?);
        labels.push(parse_cell(fields[label_idx], columns[label_idx])?);
        weights.push(parse_cell(fields[weight_idx], columns[weight_idx])?);
        for (slot, &i) in demographics.iter_mut().zip(&demographic_idx) {
            slot.push(fields[i].to_string());
        }
    }

    let attributes = ProtectedAttributes::new(
        demographic_idx
            .iter()
            .zip(demographics)
            .map(|(&i, values)| (columns[i].to_string(), values))
            .collect(),
    )?;
    AuditTable::new(outcomes, predictions, labels, weights, attributes)
}

fn parse_cell(field: &str, column: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| Error::Parse(format!("invalid number {field:?} in column {column:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
model prediction,binary outcome,model label,sample weights,race,sex
0.9,1,1,1.0,a,f
0.2,0,0,1.0,b,f
0.7,1,1,2.0,a,m
";

    #[test]
    fn parses_required_and_demographic_columns() {
        let table = parse_audit_csv(SAMPLE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.predictions(), &[0.9, 0.2, 0.7]);
        assert_eq!(table.outcomes(), &[1.0, 0.0, 1.0]);
        assert_eq!(table.weights(), &[1.0, 1.0, 2.0]);
        assert_eq!(
            table.attributes().names(),
            &["race".to_string(), "sex".to_string()]
        );
        assert_eq!(table.attributes().column("sex").unwrap()[2], "m");
    }

    #[test]
    fn required_columns_match_case_insensitively() {
        let text = SAMPLE.replace("model prediction", "Model Prediction");
        assert!(parse_audit_csv(&text).is_ok());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let text = SAMPLE.replace("sample weights", "weights");
        assert!(matches!(
            parse_audit_csv(&text),
            Err(Error::MissingColumn(name)) if name == "sample weights"
        ));
    }

    #[test]
    fn dataset_without_demographics_is_a_config_error() {
        let text = "\
model prediction,binary outcome,model label,sample weights
0.9,1,1,1.0
";
        assert!(matches!(parse_audit_csv(text), Err(Error::ConfigError(_))));
    }

    #[test]
    fn short_row_is_a_length_mismatch() {
        let text = "\
model prediction,binary outcome,model label,sample weights,race
0.9,1,1,1.0
";
        assert!(matches!(
            parse_audit_csv(text),
            Err(Error::LengthMismatch { expected: 5, got: 4 })
        ));
    }

    #[test]
    fn bad_number_is_a_parse_error() {
        let text = "\
model prediction,binary outcome,model label,sample weights,race
abc,1,1,1.0,a
";
        assert!(matches!(parse_audit_csv(text), Err(Error::Parse(_))));
    }
}
