//! Decoding of external probability estimates into labels ranked by probability.
//!
//! Two output layouts are understood:
//!
//! * plain: line 1 holds the predicted label and each following line a probability row
//!   whose k-th column belongs to the k-th label of the [`LabelTable`];
//! * LIBSVM (`svm-predict -b 1`): a `labels <c0> <c1> ...` header naming the class id of each
//!   column, then one `<predicted> <p0> <p1> ...` row per instance.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};
use crate::labels::{ClassId, LabelTable};

const HEADER_PREFIX: &str = "labels";

/// One label with its estimated probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    /// Human readable label.
    pub label: String,
    /// Estimated probability in `[0, 1]`.
    pub probability: f64,
}

/// Probability estimates for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    /// Label identifier chosen by the predictor, verbatim.
    pub predicted: String,
    /// Probability columns in output order.
    pub probabilities: Vec<f64>,
}

/// Parsed predictor output.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutput {
    /// Class id of each column when the output carried a `labels` header.
    pub columns: Option<Vec<ClassId>>,
    /// One row per predicted instance.
    pub rows: Vec<PredictionRow>,
}

impl PredictionOutput {
    /// Reads and parses a predictor output file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
        Self::parse(&text)
    }

    /// Parses either supported layout.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let first = lines
            .next()
            .ok_or_else(|| SvmTextError::Parse("prediction output is empty".into()))?;

        let mut first_fields = first.split_whitespace();
        if first_fields.next() == Some(HEADER_PREFIX) {
            let columns = first_fields
                .map(|field| {
                    field.parse::<ClassId>().map_err(|_| {
                        SvmTextError::Integrity(format!(
                            "prediction column label `{field}` is not a known class id"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let rows = lines
                .map(|line| {
                    let mut fields = line.split_whitespace();
                    let predicted = fields.next().unwrap_or_default().to_owned();
                    let probabilities = parse_probabilities(fields)?;
                    Ok(PredictionRow {
                        predicted,
                        probabilities,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self {
                columns: Some(columns),
                rows,
            });
        }

        let predicted = first
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_owned();
        let rows = lines
            .map(|line| {
                Ok(PredictionRow {
                    predicted: predicted.clone(),
                    probabilities: parse_probabilities(line.split_whitespace())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: None,
            rows,
        })
    }

    /// Returns the first row, as produced for a single-instance request.
    pub fn first_row(&self) -> Result<&PredictionRow> {
        self.rows
            .first()
            .ok_or_else(|| SvmTextError::Parse("prediction output has no probability row".into()))
    }

    /// Reorders `row`'s probabilities into label table order.
    ///
    /// Without a header the columns are taken positionally. With a header, labels that have
    /// no column (classes absent from the training partition) receive probability zero.
    pub fn aligned_probabilities(&self, row: &PredictionRow, table: &LabelTable) -> Result<Vec<f64>> {
        ensure_labels(table)?;
        let Some(columns) = &self.columns else {
            if row.probabilities.len() != table.len() {
                return Err(SvmTextError::Integrity(format!(
                    "prediction has {} probability columns but the label table has {} labels",
                    row.probabilities.len(),
                    table.len()
                )));
            }
            return Ok(row.probabilities.clone());
        };
        if columns.len() != row.probabilities.len() {
            return Err(SvmTextError::Integrity(format!(
                "prediction header names {} columns but the row has {}",
                columns.len(),
                row.probabilities.len()
            )));
        }
        let mut aligned = vec![0.0; table.len()];
        let mut seen = vec![false; table.len()];
        for (&class_id, &probability) in columns.iter().zip(&row.probabilities) {
            if class_id >= table.len() || seen[class_id] {
                return Err(SvmTextError::Integrity(format!(
                    "prediction column for class id {class_id} does not match the {}-label table",
                    table.len()
                )));
            }
            seen[class_id] = true;
            aligned[class_id] = probability;
        }
        Ok(aligned)
    }
}

/// Pairs each label with its column probability and sorts by descending probability.
///
/// The sort is stable: equal probabilities keep label table order.
pub fn rank(table: &LabelTable, probabilities: &[f64]) -> Result<Vec<RankedPrediction>> {
    ensure_labels(table)?;
    if probabilities.len() != table.len() {
        return Err(SvmTextError::Integrity(format!(
            "{} probabilities supplied for {} labels",
            probabilities.len(),
            table.len()
        )));
    }
    let mut ranked = table
        .iter()
        .zip(probabilities)
        .map(|(label, &probability)| {
            Ok(RankedPrediction {
                label: label.to_owned(),
                probability: check_probability(probability, label)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    Ok(ranked)
}

/// Ranks the first row of a single-instance prediction output.
pub fn rank_output(table: &LabelTable, output: &PredictionOutput) -> Result<Vec<RankedPrediction>> {
    ensure_labels(table)?;
    let row = output.first_row()?;
    let aligned = output.aligned_probabilities(row, table)?;
    rank(table, &aligned)
}

fn ensure_labels(table: &LabelTable) -> Result<()> {
    if table.is_empty() {
        return Err(SvmTextError::Integrity(
            "label table is empty; predictions cannot be decoded".into(),
        ));
    }
    Ok(())
}

fn parse_probabilities<'a>(fields: impl Iterator<Item = &'a str>) -> Result<Vec<f64>> {
    fields
        .map(|field| {
            let value: f64 = field
                .parse()
                .map_err(|err| SvmTextError::Parse(format!("invalid probability `{field}`: {err}")))?;
            check_probability(value, field)
        })
        .collect()
}

/// Accepts finite probabilities within `[0, 1]`; NaN fails the range check too.
fn check_probability(value: f64, context: &str) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SvmTextError::Parse(format!(
            "probability {value} for `{context}` lies outside [0, 1]"
        )))
    }
}
