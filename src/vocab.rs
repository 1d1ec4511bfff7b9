//! Bidirectional token ↔ feature id mapping with growing (build) and frozen (inference) modes.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Result, SvmTextError};

/// Feature identifier assigned to a vocabulary word. Ids start at 1.
pub type FeatureId = u32;

/// Vocabulary mapping words to dense ids `1..=N` in first-seen order.
///
/// A growing index assigns the next id the first time a token is resolved. A frozen index,
/// loaded from a persisted table, only answers lookups and is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyIndex {
    words: Vec<String>,
    ids: FxHashMap<String, FeatureId>,
    frozen: bool,
}

impl VocabularyIndex {
    /// Creates an empty index that grows as new tokens are resolved.
    #[must_use]
    pub fn growing() -> Self {
        Self::default()
    }

    /// Loads a frozen index from a `<id>\t<word>` table sorted by id.
    ///
    /// Ids must form the dense range `1..=N` in ascending order and words must be unique.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
        let mut index = Self::growing();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
            if line.trim().is_empty() {
                continue;
            }
            let (raw_id, word) = line.split_once('\t').ok_or_else(|| {
                SvmTextError::Parse(format!(
                    "{}:{}: expected `<id>\\t<word>`",
                    path.display(),
                    line_no + 1
                ))
            })?;
            let id: FeatureId = raw_id.trim().parse().map_err(|err| {
                SvmTextError::Parse(format!(
                    "{}:{}: invalid id `{raw_id}`: {err}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            let expected = index.next_id()?;
            if id != expected {
                return Err(SvmTextError::Integrity(format!(
                    "{}:{}: vocabulary ids must be dense and ascending; expected {expected}, found {id}",
                    path.display(),
                    line_no + 1
                )));
            }
            if index.ids.contains_key(word) {
                return Err(SvmTextError::Integrity(format!(
                    "{}:{}: duplicate vocabulary word `{word}`",
                    path.display(),
                    line_no + 1
                )));
            }
            index.push(word.to_owned(), id);
        }
        index.frozen = true;
        Ok(index)
    }

    /// Persists the table as `<id>\t<word>` lines in ascending id order.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_err = |err| SvmTextError::io(err, Some(path.to_path_buf()));
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        for (id, word) in self.iter() {
            writeln!(writer, "{id}\t{word}").map_err(io_err)?;
        }
        writer.flush().map_err(io_err)
    }

    /// Returns the id for `token`, assigning the next sequential id on first sight.
    ///
    /// Fails on a frozen index.
    pub fn lookup_or_insert(&mut self, token: &str) -> Result<FeatureId> {
        if let Some(&id) = self.ids.get(token) {
            return Ok(id);
        }
        if self.frozen {
            return Err(SvmTextError::Integrity(format!(
                "cannot add `{token}` to a frozen vocabulary"
            )));
        }
        let id = self.next_id()?;
        self.push(token.to_owned(), id);
        Ok(id)
    }

    /// Returns the id for `token` if present. Never mutates.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<FeatureId> {
        self.ids.get(token).copied()
    }

    /// Mode-aware resolution: inserts when growing, looks up when frozen.
    pub fn resolve(&mut self, token: &str) -> Result<Option<FeatureId>> {
        if self.frozen {
            Ok(self.lookup(token))
        } else {
            self.lookup_or_insert(token).map(Some)
        }
    }

    /// Stops the index from growing; later resolutions only look tokens up.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the index rejects new tokens.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns the word stored under `id`.
    #[must_use]
    pub fn word(&self, id: FeatureId) -> Option<&str> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.words.get(idx).map(String::as_str)
    }

    /// Number of distinct words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no words have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates `(id, word)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &str)> + '_ {
        (1..).zip(self.words.iter().map(String::as_str))
    }

    fn next_id(&self) -> Result<FeatureId> {
        FeatureId::try_from(self.words.len() + 1).map_err(|_| {
            SvmTextError::Integrity(format!(
                "vocabulary exceeds {} entries, the maximum representable FeatureId",
                FeatureId::MAX
            ))
        })
    }

    fn push(&mut self, word: String, id: FeatureId) {
        self.ids.insert(word.clone(), id);
        self.words.push(word);
    }
}
