//! Train/test routing of encoded instance lines around a single shared rescaling pass.
//!
//! The rescaler needs one reference range for both partitions, so all lines are scaled
//! together in one combined file and split again afterwards. The combined file always lists
//! every train line before every test line. Reconstruction therefore slices by count, and
//! it refuses to slice when the scaled line count differs from the number of routed lines.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SvmTextError};

/// Partition an instance was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Used to train the model.
    Train,
    /// Held out for evaluation.
    Test,
}

/// Scaled lines split back into their partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaledPartitions {
    /// Scaled training lines in routing order.
    pub train: Vec<String>,
    /// Scaled test lines in routing order.
    pub test: Vec<String>,
}

/// Routes instance lines to train or test with an independent draw per instance.
#[derive(Debug, Clone)]
pub struct CorpusSplitter<R = StdRng> {
    train_fraction: f64,
    rng: R,
    train: Vec<String>,
    test: Vec<String>,
}

impl CorpusSplitter<StdRng> {
    /// Creates a splitter seeded from `seed`, or from system entropy when `None`.
    pub fn seeded(train_fraction: f64, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(train_fraction, rng)
    }
}

impl<R: Rng> CorpusSplitter<R> {
    /// Creates a splitter drawing from `rng`. `train_fraction` must lie within `[0, 1]`.
    pub fn new(train_fraction: f64, rng: R) -> Result<Self> {
        if !train_fraction.is_finite() || !(0.0..=1.0).contains(&train_fraction) {
            return Err(SvmTextError::InvalidConfig(format!(
                "train_fraction ({train_fraction}) must lie within [0, 1]"
            )));
        }
        Ok(Self {
            train_fraction,
            rng,
            train: Vec::new(),
            test: Vec::new(),
        })
    }

    /// Draws a partition for `line` and records it there.
    pub fn route(&mut self, line: String) -> Partition {
        let partition = if self.rng.gen_bool(self.train_fraction) {
            Partition::Train
        } else {
            Partition::Test
        };
        self.push(partition, line);
        partition
    }
}

impl<R> CorpusSplitter<R> {
    /// Records `line` in an explicitly chosen partition.
    pub fn push(&mut self, partition: Partition, line: String) {
        match partition {
            Partition::Train => self.train.push(line),
            Partition::Test => self.test.push(line),
        }
    }

    /// Unscaled training lines.
    #[must_use]
    pub fn train(&self) -> &[String] {
        &self.train
    }

    /// Unscaled test lines.
    #[must_use]
    pub fn test(&self) -> &[String] {
        &self.test
    }

    /// Total number of routed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Whether no line has been routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All routed lines, train lines first.
    pub fn combined(&self) -> impl Iterator<Item = &str> + '_ {
        self.train.iter().chain(self.test.iter()).map(String::as_str)
    }

    /// Writes [`Self::combined`] to `path`, one line per instance.
    pub fn write_combined<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_lines(path.as_ref(), self.combined())
    }

    /// Splits the rescaled combined lines back into train and test.
    ///
    /// Line `i` of the scaled output must correspond to line `i` of [`Self::combined`].
    pub fn reconstruct(&self, mut scaled: Vec<String>) -> Result<ScaledPartitions> {
        if scaled.len() != self.len() {
            return Err(SvmTextError::Integrity(format!(
                "rescaled corpus has {} lines but {} were routed ({} train + {} test)",
                scaled.len(),
                self.len(),
                self.train.len(),
                self.test.len()
            )));
        }
        let test = scaled.split_off(self.train.len());
        Ok(ScaledPartitions {
            train: scaled,
            test,
        })
    }

    /// File-level [`Self::reconstruct`]: reads `scaled` and writes the two partition files.
    pub fn split_scaled_file<P, Q, S>(&self, scaled: P, train_out: Q, test_out: S) -> Result<ScaledPartitions>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        S: AsRef<Path>,
    {
        let partitions = self.reconstruct(read_lines(scaled.as_ref())?)?;
        write_lines(train_out.as_ref(), partitions.train.iter().map(String::as_str))?;
        write_lines(test_out.as_ref(), partitions.test.iter().map(String::as_str))?;
        Ok(partitions)
    }
}

/// Reads every line of a text file.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))
}

/// Writes each item as one newline-terminated line.
pub fn write_lines<'a, I>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let io_err = |err| SvmTextError::io(err, Some(path.to_path_buf()));
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for line in lines {
        writeln!(writer, "{line}").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}
