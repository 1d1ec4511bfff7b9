//! Configuration builders controlling index construction, corpus ingestion, and external tools.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SvmTextError};
use serde::{Deserialize, Serialize};

/// Default share of documents routed to the training partition.
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// Configuration for building an index from a labeled corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Probability that a document is routed to the training partition.
    pub train_fraction: f64,
    /// Seed for the train/test draw; `None` seeds from system entropy.
    pub seed: Option<u64>,
    /// Runs the external trainer on the scaled training partition after splitting.
    pub train_model: bool,
    /// Enables per-document logging through the `log` facade.
    pub show_progress: bool,
    /// Controls how the corpus directory is traversed.
    pub ingest: IngestConfig,
}

impl BuildConfig {
    /// Returns a builder initialised with [`BuildConfig::default`].
    #[must_use]
    pub fn builder() -> BuildBuilder {
        BuildBuilder::default()
    }

    /// Validates the invariants required for building an index.
    pub fn validate(&self) -> Result<()> {
        if !self.train_fraction.is_finite() || !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(SvmTextError::InvalidConfig(format!(
                "train_fraction ({}) must lie within [0, 1]",
                self.train_fraction
            )));
        }
        Ok(())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            seed: None,
            train_model: true,
            show_progress: true,
            ingest: IngestConfig::default(),
        }
    }
}

/// Builder for [`BuildConfig`].
#[derive(Debug, Default, Clone)]
pub struct BuildBuilder {
    cfg: BuildConfig,
}

impl BuildBuilder {
    /// Creates a builder with [`BuildConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probability of routing a document to the training partition.
    #[must_use]
    pub fn train_fraction(mut self, value: f64) -> Self {
        self.cfg.train_fraction = value;
        self
    }

    /// Fixes the seed used for the train/test draw.
    #[must_use]
    pub fn seed(mut self, value: Option<u64>) -> Self {
        self.cfg.seed = value;
        self
    }

    /// Enables or disables model training after the split.
    #[must_use]
    pub fn train_model(mut self, enabled: bool) -> Self {
        self.cfg.train_model = enabled;
        self
    }

    /// Enables or disables per-document logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Overrides the corpus traversal settings.
    #[must_use]
    pub fn ingest(mut self, ingest: IngestConfig) -> Self {
        self.cfg.ingest = ingest;
        self
    }

    /// Finalises the builder, returning a validated [`BuildConfig`].
    pub fn build(self) -> Result<BuildConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how labeled corpora are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Descends into nested directories below each label directory.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}

/// Locations and options for the external LIBSVM programs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    /// Rescaling program (`svm-scale`).
    pub scale_program: PathBuf,
    /// Training program (`svm-train`).
    pub train_program: PathBuf,
    /// Prediction program (`svm-predict`).
    pub predict_program: PathBuf,
    /// Lower bound passed to the rescaler; `None` keeps the tool default.
    pub scale_lower: Option<f64>,
    /// Upper bound passed to the rescaler; `None` keeps the tool default.
    pub scale_upper: Option<f64>,
    /// Extra arguments inserted before the input file when training.
    pub train_args: Vec<String>,
    /// Kills an external process that runs longer than this; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            scale_program: PathBuf::from("svm-scale"),
            train_program: PathBuf::from("svm-train"),
            predict_program: PathBuf::from("svm-predict"),
            scale_lower: None,
            scale_upper: None,
            train_args: Vec::new(),
            timeout: None,
        }
    }
}

impl ToolConfig {
    /// Returns a builder initialised with [`ToolConfig::default`].
    #[must_use]
    pub fn builder() -> ToolBuilder {
        ToolBuilder::default()
    }

    /// Validates the scaling bounds and timeout.
    pub fn validate(&self) -> Result<()> {
        for (name, bound) in [("scale_lower", self.scale_lower), ("scale_upper", self.scale_upper)]
        {
            if bound.is_some_and(|value| !value.is_finite()) {
                return Err(SvmTextError::InvalidConfig(format!(
                    "{name} must be a finite number"
                )));
            }
        }
        if let (Some(lower), Some(upper)) = (self.scale_lower, self.scale_upper) {
            if lower >= upper {
                return Err(SvmTextError::InvalidConfig(format!(
                    "scale_lower ({lower}) must be smaller than scale_upper ({upper})"
                )));
            }
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SvmTextError::InvalidConfig(
                "tool timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ToolConfig`].
#[derive(Debug, Default, Clone)]
pub struct ToolBuilder {
    cfg: ToolConfig,
}

impl ToolBuilder {
    /// Creates a builder with [`ToolConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the rescaling program.
    #[must_use]
    pub fn scale_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.scale_program = path.into();
        self
    }

    /// Overrides the training program.
    #[must_use]
    pub fn train_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.train_program = path.into();
        self
    }

    /// Overrides the prediction program.
    #[must_use]
    pub fn predict_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.cfg.predict_program = path.into();
        self
    }

    /// Sets the rescaling bounds.
    #[must_use]
    pub fn scale_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.cfg.scale_lower = lower;
        self.cfg.scale_upper = upper;
        self
    }

    /// Overrides the extra training arguments.
    #[must_use]
    pub fn train_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.train_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cfg.timeout = timeout;
        self
    }

    /// Finalises the builder, returning a validated [`ToolConfig`].
    pub fn build(self) -> Result<ToolConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
