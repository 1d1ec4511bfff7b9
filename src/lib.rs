//! Bag-of-words feature extraction and prediction ranking for LIBSVM text classifiers.
//!
//! The crate exposes both a library API and an `svmtext` command line interface. At corpus
//! time an [`IndexBuilder`] turns a directory of labeled documents into a vocabulary, a label
//! table and scaled train/test partitions, then trains a model with the external LIBSVM
//! tools. At inference time a [`Classifier`] encodes one text against the frozen vocabulary
//! and ranks every label by the probability the external predictor assigns to it.
//!
//! ```no_run
//! use svmtext::{BuildConfig, Classifier, IndexBuilder, LibSvmTools, ToolConfig};
//!
//! # fn main() -> svmtext::Result<()> {
//! let tools = LibSvmTools::new(ToolConfig::default());
//! let build_cfg = BuildConfig::builder().seed(Some(7)).build()?;
//! IndexBuilder::new(build_cfg, &tools).build("/path/to/corpus", "/path/to/index")?;
//!
//! let classifier = Classifier::open("/path/to/index", &tools)?;
//! for prediction in classifier.classify(b"Some text to classify")?.predictions() {
//!     println!("{}\t{:.4}", prediction.label, prediction.probability);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `svmtext = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod classifier;
pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod index;
pub mod labels;
pub mod metrics;
pub mod ranking;
pub mod splitter;
pub mod text;
pub mod tools;
pub mod vocab;

#[cfg(test)]
mod test_utils;

pub use classifier::{Classification, Classifier};
pub use config::{BuildBuilder, BuildConfig, IngestConfig, ToolBuilder, ToolConfig};
pub use error::{Result, SvmTextError};
pub use features::SparseFeatureVector;
pub use index::{IndexBuilder, IndexLayout};
pub use labels::{LabelRegistry, LabelTable};
pub use metrics::{BuildSummary, EvaluationReport};
pub use ranking::RankedPrediction;
pub use splitter::{CorpusSplitter, Partition};
pub use tools::{ExternalTools, LibSvmTools, RangeFile};
pub use vocab::{FeatureId, VocabularyIndex};
