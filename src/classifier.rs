//! Inference-time classification of single texts against a built index.

use std::path::Path;

use log::{debug, info};
use tempfile::TempDir;

use crate::error::{Result, SvmTextError};
use crate::features::{
    encode_frozen, format_instance, instance_label, SparseFeatureVector, PLACEHOLDER_LABEL,
};
use crate::index::IndexLayout;
use crate::labels::LabelTable;
use crate::metrics::EvaluationReport;
use crate::ranking::{rank_output, PredictionOutput, RankedPrediction};
use crate::splitter::{read_lines, write_lines};
use crate::text::normalize_and_tokenize;
use crate::tools::{ExternalTools, RangeFile};
use crate::vocab::VocabularyIndex;

/// Result of classifying one text.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// No token of the text is in the vocabulary; nothing was scaled or predicted.
    NoRecognizedTokens,
    /// Every label ranked by descending probability.
    Ranked(Vec<RankedPrediction>),
}

impl Classification {
    /// Ranked predictions, empty when no token was recognised.
    #[must_use]
    pub fn predictions(&self) -> &[RankedPrediction] {
        match self {
            Self::NoRecognizedTokens => &[],
            Self::Ranked(predictions) => predictions,
        }
    }

    /// Most probable label, if any.
    #[must_use]
    pub fn top(&self) -> Option<&RankedPrediction> {
        self.predictions().first()
    }
}

/// Frozen vocabulary and label table loaded from an index, plus the tools to score with.
///
/// The loaded tables are never mutated, and every request writes its intermediate files to
/// its own temporary directory.
#[derive(Debug)]
pub struct Classifier<T> {
    layout: IndexLayout,
    vocab: VocabularyIndex,
    labels: LabelTable,
    tools: T,
}

impl<T: ExternalTools> Classifier<T> {
    /// Opens the index in `index_dir`, failing if any inference artifact is missing.
    pub fn open<P: AsRef<Path>>(index_dir: P, tools: T) -> Result<Self> {
        let layout = IndexLayout::new(index_dir.as_ref());
        for (what, path) in layout.required_for_inference() {
            if !path.is_file() {
                return Err(SvmTextError::InvalidConfig(format!(
                    "missing {what} at {}",
                    path.display()
                )));
            }
        }
        let vocab = VocabularyIndex::load(layout.vocabulary())?;
        let labels = LabelTable::load(layout.labels())?;
        info!(
            "loaded index {}: vocab={} labels={}",
            layout.root().display(),
            vocab.len(),
            labels.len()
        );
        Ok(Self {
            layout,
            vocab,
            labels,
            tools,
        })
    }

    /// Frozen vocabulary.
    #[must_use]
    pub fn vocabulary(&self) -> &VocabularyIndex {
        &self.vocab
    }

    /// Label table in probability column order.
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Encodes `text` against the frozen vocabulary.
    #[must_use]
    pub fn encode(&self, text: &[u8]) -> SparseFeatureVector {
        encode_frozen(&self.vocab, &normalize_and_tokenize(text))
    }

    /// Classifies raw text bytes.
    pub fn classify(&self, text: &[u8]) -> Result<Classification> {
        let features = self.encode(text);
        if features.is_empty() {
            debug!("no recognised tokens; skipping scaling and prediction");
            return Ok(Classification::NoRecognizedTokens);
        }

        let workdir = scratch_dir()?;
        let instance = workdir.path().join("instance.svm");
        let scaled = workdir.path().join("instance.scaled");
        let output = workdir.path().join("prediction.txt");
        let line = format_instance(PLACEHOLDER_LABEL, &features);
        debug!("classifying instance `{line}`");
        write_lines(&instance, [line.as_str()])?;

        self.tools
            .rescale(&instance, RangeFile::Restore(&self.layout.scale_range()), &scaled)?;
        self.tools.predict(&scaled, &self.layout.model(), &output)?;
        let prediction = PredictionOutput::load(&output)?;
        Ok(Classification::Ranked(rank_output(&self.labels, &prediction)?))
    }

    /// Predicts the held-out partition and counts correct class ids.
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        let test_path = self.layout.test();
        if !test_path.is_file() {
            return Err(SvmTextError::InvalidConfig(format!(
                "missing test partition at {}",
                test_path.display()
            )));
        }
        let instances = read_lines(&test_path)?;
        if instances.is_empty() {
            return Ok(EvaluationReport::new(0, 0));
        }

        let workdir = scratch_dir()?;
        let output = workdir.path().join("test.prediction");
        self.tools.predict(&test_path, &self.layout.model(), &output)?;
        let prediction = PredictionOutput::load(&output)?;
        if prediction.rows.len() != instances.len() {
            return Err(SvmTextError::Integrity(format!(
                "predictor returned {} rows for {} test instances",
                prediction.rows.len(),
                instances.len()
            )));
        }

        let mut correct = 0;
        for (row, line) in prediction.rows.iter().zip(&instances) {
            if same_class(&row.predicted, instance_label(line)?) {
                correct += 1;
            }
        }
        let report = EvaluationReport::new(instances.len(), correct);
        info!("evaluated {} test instances: {} correct", report.instances, report.correct);
        Ok(report)
    }
}

fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("svmtext-")
        .tempdir()
        .map_err(|err| SvmTextError::io(err, None))
}

/// Compares class labels numerically when both parse, so `1` matches `1.0`.
fn same_class(predicted: &str, expected: &str) -> bool {
    match (predicted.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => predicted == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::index::IndexBuilder;
    use crate::test_utils::FakeTools;
    use std::fs;
    use tempfile::tempdir;

    fn build_index(root: &Path, train_fraction: f64) -> std::path::PathBuf {
        let corpus = root.join("corpus");
        for (label, name, text) in [
            ("animals", "a.txt", "cat dog"),
            ("animals", "b.txt", "dog bird"),
            ("weather", "c.txt", "rain snow"),
        ] {
            fs::create_dir_all(corpus.join(label)).unwrap();
            fs::write(corpus.join(label).join(name), text).unwrap();
        }
        let index = root.join("index");
        let cfg = BuildConfig::builder()
            .train_fraction(train_fraction)
            .seed(Some(5))
            .show_progress(false)
            .build()
            .unwrap();
        IndexBuilder::new(cfg, FakeTools::default())
            .build(&corpus, &index)
            .expect("build index");
        index
    }

    #[test]
    fn classify_ranks_labels_from_predictor_output() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        let tools = FakeTools::with_probabilities(vec![0.25, 0.75]);
        let classifier = Classifier::open(&index, &tools).expect("open index");

        let result = classifier.classify(b"Snow and RAIN!").expect("classify");
        let predictions = result.predictions();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "weather");
        assert_eq!(predictions[0].probability, 0.75);
        assert_eq!(predictions[1].label, "animals");
        assert_eq!(tools.calls(), vec!["scale", "predict"]);
    }

    #[test]
    fn unknown_tokens_short_circuit_without_running_tools() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        let tools = FakeTools::with_probabilities(vec![0.5, 0.5]);
        let classifier = Classifier::open(&index, &tools).expect("open index");

        let result = classifier.classify(b"zebra 42 quokka").expect("classify");
        assert_eq!(result, Classification::NoRecognizedTokens);
        assert!(result.top().is_none());
        assert!(tools.calls().is_empty());
        assert_eq!(classifier.vocabulary().len(), 5);
    }

    #[test]
    fn encode_ignores_unknown_tokens() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        let classifier = Classifier::open(&index, FakeTools::default()).expect("open index");
        assert_eq!(classifier.encode(b"dog zebra dog").to_libsvm(), "2:2");
    }

    #[test]
    fn open_requires_every_artifact() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        fs::remove_file(IndexLayout::new(&index).scale_range()).unwrap();
        let err = Classifier::open(&index, FakeTools::default()).expect_err("range is missing");
        assert!(matches!(
            err,
            SvmTextError::InvalidConfig(message) if message.contains("scale range")
        ));
    }

    #[test]
    fn evaluate_counts_matching_predictions() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 0.0);
        // Nothing was routed to training, so no model was written.
        let model = IndexLayout::new(&index).model();
        assert!(!model.exists());
        fs::write(&model, "model\n").unwrap();
        // Every instance is predicted as class 0 (`animals`); two of three documents are animals.
        let classifier =
            Classifier::open(&index, FakeTools::with_probabilities(vec![0.9, 0.1])).unwrap();
        let report = classifier.evaluate().expect("evaluate");
        assert_eq!(report.instances, 3);
        assert_eq!(report.correct, 2);
    }

    #[test]
    fn evaluate_reads_labels_from_signed_fractional_scaled_lines() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 0.0);
        let layout = IndexLayout::new(&index);
        fs::write(layout.model(), "model\n").unwrap();
        fs::write(layout.test(), "0 1:1 2:-1 3:-1 \n1 1:-1 2:1 3:0.5 \n").unwrap();

        let classifier =
            Classifier::open(&index, FakeTools::with_probabilities(vec![0.3, 0.7])).unwrap();
        let report = classifier.evaluate().expect("evaluate scaled partition");
        assert_eq!(report, EvaluationReport::new(2, 1));

        fs::write(layout.test(), "1 1:-1\n\n").unwrap();
        assert!(matches!(classifier.evaluate(), Err(SvmTextError::Parse(_))));
    }

    #[test]
    fn classify_scales_the_instance_against_the_saved_range() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        let layout = IndexLayout::new(&index);
        let scaled = fs::read_to_string(layout.train()).unwrap();
        assert!(scaled.contains(":-1 "), "scaled partition: {scaled}");

        let tools = FakeTools::with_probabilities(vec![0.6, 0.4]);
        let result = Classifier::open(&index, &tools)
            .unwrap()
            .classify(b"dog dog cat")
            .expect("classify");
        assert_eq!(result.top().map(|p| p.label.as_str()), Some("animals"));
    }

    #[test]
    fn evaluate_with_empty_test_partition_reports_nothing() {
        let dir = tempdir().expect("tempdir");
        let index = build_index(dir.path(), 1.0);
        let tools = FakeTools::with_probabilities(vec![0.5, 0.5]);
        let report = Classifier::open(&index, &tools)
            .unwrap()
            .evaluate()
            .expect("evaluate");
        assert_eq!(report, EvaluationReport::new(0, 0));
        assert!(tools.calls().is_empty());
    }

    #[test]
    fn same_class_compares_numerically() {
        assert!(same_class("1", "1.0"));
        assert!(!same_class("1", "2"));
        assert!(same_class("spam", "spam"));
    }
}
