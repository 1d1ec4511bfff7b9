//! Reports describing a finished index build or evaluation run.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};

/// Document count for one label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSummary {
    /// Label name.
    pub label: String,
    /// Class id written into instance lines.
    pub class_id: usize,
    /// Number of documents carrying the label.
    pub documents: usize,
}

/// Aggregate statistics produced by an index build, persisted as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSummary {
    /// Number of documents encoded.
    pub documents: usize,
    /// Documents without a single token (emitted as label-only lines).
    pub empty_documents: usize,
    /// Distinct vocabulary words.
    pub vocabulary_size: usize,
    /// Per-label document counts in class id order.
    pub labels: Vec<LabelSummary>,
    /// Instances routed to the training partition.
    pub train_instances: usize,
    /// Instances routed to the test partition.
    pub test_instances: usize,
    /// Configured probability of routing to training.
    pub train_fraction: f64,
    /// Seed used for the split, if fixed.
    pub seed: Option<u64>,
    /// Whether a model was trained.
    pub model_trained: bool,
    /// Wall clock duration of the build.
    pub duration: Duration,
}

impl BuildSummary {
    /// Writes the summary as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))
    }

    /// Reads a summary written by [`Self::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Outcome of predicting the held-out partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    /// Number of test instances predicted.
    pub instances: usize,
    /// Instances whose predicted class id matched the true one.
    pub correct: usize,
    /// `correct / instances`; `None` when the test partition is empty.
    pub accuracy: Option<f64>,
}

impl EvaluationReport {
    /// Builds a report from raw counts.
    #[must_use]
    pub fn new(instances: usize, correct: usize) -> Self {
        let accuracy = (instances > 0).then(|| correct as f64 / instances as f64);
        Self {
            instances,
            correct,
            accuracy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn summary_round_trips_through_json() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("summary.json");
        let summary = BuildSummary {
            documents: 3,
            empty_documents: 0,
            vocabulary_size: 5,
            labels: vec![LabelSummary {
                label: "news".into(),
                class_id: 0,
                documents: 3,
            }],
            train_instances: 2,
            test_instances: 1,
            train_fraction: 0.8,
            seed: Some(9),
            model_trained: true,
            duration: Duration::from_millis(12),
        };
        summary.save(&path).expect("save summary");
        assert_eq!(BuildSummary::load(&path).expect("load summary"), summary);
    }

    #[test]
    fn accuracy_is_absent_for_empty_partition() {
        assert_eq!(EvaluationReport::new(0, 0).accuracy, None);
        assert_eq!(EvaluationReport::new(4, 3).accuracy, Some(0.75));
    }
}
