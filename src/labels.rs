//! Label bookkeeping: occurrence counts during corpus traversal and the persisted label table.
//!
//! The class identifier written into every LIBSVM line is the label's position in the
//! alphabetically sorted [`LabelTable`]. Prediction columns are decoded against the same
//! positions, so training labels and probability columns always agree. Occurrence counts
//! from [`LabelRegistry::observe`] are statistics only.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SvmTextError};

/// Class identifier: 0-based position of a label in the sorted [`LabelTable`].
pub type ClassId = usize;

/// Labels observed while traversing a corpus, with their document counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRegistry {
    counts: BTreeMap<String, usize>,
}

impl LabelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one document for `label` and returns its updated occurrence count.
    pub fn observe(&mut self, label: &str) -> usize {
        let count = self.counts.entry(label.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns how many documents carried `label`.
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Iterates `(label, count)` pairs in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts.iter().map(|(label, &count)| (label.as_str(), count))
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no label has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Builds the alphabetically sorted label table.
    #[must_use]
    pub fn table(&self) -> LabelTable {
        LabelTable {
            labels: self.counts.keys().cloned().collect(),
        }
    }
}

/// Ordered list of labels. A label's position is its [`ClassId`] and its probability column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Builds a table from labels already in column order.
    #[must_use]
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Loads a table with one label per line. An empty table is an integrity error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
        let mut labels = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
            let label = line.trim_end_matches(['\r', '\n']);
            if !label.is_empty() {
                labels.push(label.to_owned());
            }
        }
        if labels.is_empty() {
            return Err(SvmTextError::Integrity(format!(
                "label table {} is empty",
                path.display()
            )));
        }
        Ok(Self { labels })
    }

    /// Persists one label per line in table order.
    ///
    /// Labels containing a line break are rejected before anything is written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(label) = self.labels.iter().find(|label| label.contains(['\n', '\r'])) {
            return Err(SvmTextError::Integrity(format!(
                "label {label:?} contains a line break and cannot be stored in {}",
                path.display()
            )));
        }
        let io_err = |err| SvmTextError::io(err, Some(path.to_path_buf()));
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        for label in &self.labels {
            writeln!(writer, "{label}").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)
    }

    /// Returns the class id of `label`.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<ClassId> {
        self.labels.iter().position(|candidate| candidate == label)
    }

    /// Returns the label stored at `class_id`.
    #[must_use]
    pub fn get(&self, class_id: ClassId) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    /// Labels in column order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Iterates labels in column order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn observe_returns_running_counts() {
        let mut registry = LabelRegistry::new();
        assert_eq!(registry.observe("sports"), 1);
        assert_eq!(registry.observe("news"), 1);
        assert_eq!(registry.observe("sports"), 2);
        assert_eq!(registry.count("sports"), 2);
        assert_eq!(registry.count("weather"), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn table_is_sorted_and_positions_are_stable() {
        let mut registry = LabelRegistry::new();
        for label in ["y", "x", "z", "x"] {
            registry.observe(label);
        }
        let table = registry.table();
        assert_eq!(table.labels(), ["x", "y", "z"]);
        assert_eq!(table.position("y"), Some(1));
        assert_eq!(table.position("w"), None);
        assert_eq!(table.get(2), Some("z"));
    }

    #[test]
    fn save_and_load_preserve_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("labels.txt");
        let table = LabelTable::from_labels(["alpha", "beta"]);
        table.save(&path).expect("save labels");
        assert_eq!(fs::read_to_string(&path).unwrap(), "alpha\nbeta\n");
        assert_eq!(LabelTable::load(&path).expect("load labels"), table);
    }

    #[test]
    fn save_rejects_labels_with_line_breaks() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("labels.txt");
        for bad in ["two\nlines", "carriage\rreturn"] {
            let table = LabelTable::from_labels(["alpha", bad, "omega"]);
            assert!(matches!(table.save(&path), Err(SvmTextError::Integrity(_))));
            assert!(!path.exists());
        }
    }

    #[test]
    fn load_rejects_empty_table() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("labels.txt");
        fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            LabelTable::load(&path),
            Err(SvmTextError::Integrity(message)) if message.contains("empty")
        ));
    }
}
