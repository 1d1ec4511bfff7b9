//! Corpus-time construction of the on-disk index consumed by [`crate::Classifier`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::BuildConfig;
use crate::corpus::{collect_documents, load_document};
use crate::error::{Result, SvmTextError};
use crate::features::{encode, format_instance, SparseFeatureVector};
use crate::labels::LabelRegistry;
use crate::metrics::{BuildSummary, LabelSummary};
use crate::splitter::CorpusSplitter;
use crate::text::normalize_and_tokenize;
use crate::tools::{ExternalTools, RangeFile};
use crate::vocab::VocabularyIndex;

/// File names of every artifact stored in an index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    root: PathBuf,
}

impl IndexLayout {
    /// Describes the index rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Index directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<id>\t<word>` vocabulary table.
    #[must_use]
    pub fn vocabulary(&self) -> PathBuf {
        self.root.join("vocabulary.tsv")
    }

    /// Sorted label table; line order is column order.
    #[must_use]
    pub fn labels(&self) -> PathBuf {
        self.root.join("labels.txt")
    }

    /// Unscaled instance lines, all train lines before all test lines.
    #[must_use]
    pub fn combined(&self) -> PathBuf {
        self.root.join("corpus.svm")
    }

    /// Rescaled version of [`Self::combined`].
    #[must_use]
    pub fn combined_scaled(&self) -> PathBuf {
        self.root.join("corpus.scaled")
    }

    /// Scaled training partition.
    #[must_use]
    pub fn train(&self) -> PathBuf {
        self.root.join("train.scaled")
    }

    /// Scaled test partition.
    #[must_use]
    pub fn test(&self) -> PathBuf {
        self.root.join("test.scaled")
    }

    /// Rescaling reference range shared by build and inference.
    #[must_use]
    pub fn scale_range(&self) -> PathBuf {
        self.root.join("scale.range")
    }

    /// Trained model.
    #[must_use]
    pub fn model(&self) -> PathBuf {
        self.root.join("model.svm")
    }

    /// JSON [`BuildSummary`].
    #[must_use]
    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Artifacts the inference path cannot run without, with a short description each.
    #[must_use]
    pub fn required_for_inference(&self) -> [(&'static str, PathBuf); 4] {
        [
            ("vocabulary", self.vocabulary()),
            ("label table", self.labels()),
            ("scale range", self.scale_range()),
            ("model", self.model()),
        ]
    }
}

/// One encoded document awaiting its class id.
#[derive(Debug)]
struct EncodedDocument {
    label: String,
    features: SparseFeatureVector,
}

/// Builds an index from a labeled corpus directory.
#[derive(Debug)]
pub struct IndexBuilder<T> {
    cfg: BuildConfig,
    tools: T,
}

impl<T: ExternalTools> IndexBuilder<T> {
    /// Creates a builder for the supplied configuration and external tools.
    #[must_use]
    pub fn new(cfg: BuildConfig, tools: T) -> Self {
        Self { cfg, tools }
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.cfg
    }

    /// Encodes every document below `corpus_root` and writes the index to `index_dir`.
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(&self, corpus_root: P, index_dir: Q) -> Result<BuildSummary> {
        self.cfg.validate()?;
        let start = Instant::now();
        let layout = IndexLayout::new(index_dir.as_ref());
        fs::create_dir_all(layout.root())
            .map_err(|err| SvmTextError::io(err, Some(layout.root().to_path_buf())))?;

        let documents = collect_documents(corpus_root.as_ref(), &self.cfg.ingest)?;
        info!(
            "discovered {} documents below {}",
            documents.len(),
            corpus_root.as_ref().display()
        );

        let mut vocab = VocabularyIndex::growing();
        let mut registry = LabelRegistry::new();
        let mut encoded = Vec::with_capacity(documents.len());
        for document in &documents {
            let bytes = load_document(&document.path)?;
            let tokens = normalize_and_tokenize(&bytes);
            let features = encode(&mut vocab, &tokens)?;
            let seen = registry.observe(&document.label);
            if self.cfg.show_progress {
                debug!(
                    "{} [{} #{seen}]: {} tokens, {} distinct",
                    document.path.display(),
                    document.label,
                    tokens.len(),
                    features.len()
                );
            }
            encoded.push(EncodedDocument {
                label: document.label.clone(),
                features,
            });
        }
        let empty_documents = encoded.iter().filter(|doc| doc.features.is_empty()).count();
        if empty_documents > 0 {
            warn!("{empty_documents} documents contained no alphabetic tokens");
        }

        let table = registry.table();
        let mut splitter = CorpusSplitter::seeded(self.cfg.train_fraction, self.cfg.seed)?;
        for document in &encoded {
            let class_id = table.position(&document.label).ok_or_else(|| {
                SvmTextError::Internal(format!("label `{}` missing from label table", document.label))
            })?;
            splitter.route(format_instance(class_id, &document.features));
        }
        info!(
            "routed {} instances: {} train, {} test",
            splitter.len(),
            splitter.train().len(),
            splitter.test().len()
        );

        splitter.write_combined(layout.combined())?;
        self.tools.rescale(
            &layout.combined(),
            RangeFile::Save(&layout.scale_range()),
            &layout.combined_scaled(),
        )?;
        splitter.split_scaled_file(layout.combined_scaled(), layout.train(), layout.test())?;

        vocab.save(layout.vocabulary())?;
        table.save(layout.labels())?;

        let model_trained = if !self.cfg.train_model {
            false
        } else if splitter.train().is_empty() {
            warn!("training partition is empty; skipping model training");
            false
        } else {
            self.tools.train(&layout.train(), &layout.model())?;
            true
        };

        let summary = BuildSummary {
            documents: encoded.len(),
            empty_documents,
            vocabulary_size: vocab.len(),
            labels: table
                .iter()
                .enumerate()
                .map(|(class_id, label)| LabelSummary {
                    label: label.to_owned(),
                    class_id,
                    documents: registry.count(label),
                })
                .collect(),
            train_instances: splitter.train().len(),
            test_instances: splitter.test().len(),
            train_fraction: self.cfg.train_fraction,
            seed: self.cfg.seed,
            model_trained,
            duration: start.elapsed(),
        };
        summary.save(layout.summary())?;
        info!(
            "index written to {}: vocab={} labels={} duration={:.2?}",
            layout.root().display(),
            summary.vocabulary_size,
            table.len(),
            summary.duration
        );
        Ok(summary)
    }
}
