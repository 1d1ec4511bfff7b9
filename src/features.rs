//! Sparse bag-of-words vectors and their LIBSVM text encoding.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SvmTextError};
use crate::vocab::{FeatureId, VocabularyIndex};

/// Placeholder class label written for instances whose true label is unknown.
pub const PLACEHOLDER_LABEL: &str = "0";

/// Mapping from feature id to occurrence count, iterated in ascending id order.
///
/// Absent ids have an implicit count of zero. An empty vector means no token was
/// recognised and must not be fed to scaling or prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseFeatureVector {
    counts: BTreeMap<FeatureId, u32>,
}

impl SparseFeatureVector {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one occurrence of `id`.
    pub fn increment(&mut self, id: FeatureId) {
        *self.counts.entry(id).or_insert(0) += 1;
    }

    /// Returns the count recorded for `id`, or zero.
    #[must_use]
    pub fn get(&self, id: FeatureId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Number of distinct ids with a non-zero count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no id was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.values().map(|&count| u64::from(count)).sum()
    }

    /// Iterates `(id, count)` pairs in strictly ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, u32)> + '_ {
        self.counts.iter().map(|(&id, &count)| (id, count))
    }

    /// Serialises the vector as space separated `id:count` pairs.
    ///
    /// The empty vector serialises to the empty string.
    #[must_use]
    pub fn to_libsvm(&self) -> String {
        self.to_string()
    }

    /// Decodes whitespace separated `id:count` pairs produced by [`Self::to_libsvm`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut counts = BTreeMap::new();
        let mut previous: Option<FeatureId> = None;
        for pair in text.split_whitespace() {
            let (raw_id, raw_count) = pair
                .split_once(':')
                .ok_or_else(|| SvmTextError::Parse(format!("expected `id:count`, found `{pair}`")))?;
            let id: FeatureId = raw_id
                .parse()
                .map_err(|err| SvmTextError::Parse(format!("invalid feature id in `{pair}`: {err}")))?;
            let count: u32 = raw_count
                .parse()
                .map_err(|err| SvmTextError::Parse(format!("invalid count in `{pair}`: {err}")))?;
            if id == 0 {
                return Err(SvmTextError::Parse(format!(
                    "feature ids start at 1, found `{pair}`"
                )));
            }
            if let Some(prev) = previous.filter(|&prev| id <= prev) {
                return Err(SvmTextError::Parse(format!(
                    "feature ids must be strictly ascending, found `{pair}` after id {prev}"
                )));
            }
            previous = Some(id);
            if count > 0 {
                counts.insert(id, count);
            }
        }
        Ok(Self { counts })
    }
}

impl fmt::Display for SparseFeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (id, count)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{id}:{count}")?;
        }
        Ok(())
    }
}

impl FromIterator<(FeatureId, u32)> for SparseFeatureVector {
    fn from_iter<I: IntoIterator<Item = (FeatureId, u32)>>(iter: I) -> Self {
        let mut vector = Self::new();
        for (id, count) in iter {
            if count > 0 {
                *vector.counts.entry(id).or_insert(0) += count;
            }
        }
        vector
    }
}

/// Returns `true` when a serialised feature string carries no features.
#[must_use]
pub fn is_blank(serialized: &str) -> bool {
    serialized.trim().is_empty()
}

/// Counts tokens against `vocab`, inserting unseen tokens when the index is growing.
///
/// Unknown tokens are dropped when the index is frozen.
pub fn encode<S: AsRef<str>>(vocab: &mut VocabularyIndex, tokens: &[S]) -> Result<SparseFeatureVector> {
    let mut vector = SparseFeatureVector::new();
    for token in tokens {
        if let Some(id) = vocab.resolve(token.as_ref())? {
            vector.increment(id);
        }
    }
    Ok(vector)
}

/// Counts the tokens known to `vocab` without modifying it.
#[must_use]
pub fn encode_frozen<S: AsRef<str>>(vocab: &VocabularyIndex, tokens: &[S]) -> SparseFeatureVector {
    let mut vector = SparseFeatureVector::new();
    for id in tokens.iter().filter_map(|token| vocab.lookup(token.as_ref())) {
        vector.increment(id);
    }
    vector
}

/// Formats one LIBSVM instance line: `<label> <id:count> ...`.
#[must_use]
pub fn format_instance(label: impl fmt::Display, features: &SparseFeatureVector) -> String {
    if features.is_empty() {
        label.to_string()
    } else {
        format!("{label} {features}")
    }
}

/// Splits an unscaled LIBSVM instance line into its label token and count vector.
pub fn parse_instance(line: &str) -> Result<(&str, SparseFeatureVector)> {
    let label = instance_label(line)?;
    let rest = line.trim_start()[label.len()..].trim_start();
    Ok((label, SparseFeatureVector::parse(rest)?))
}

/// Returns the label token of any LIBSVM instance line, scaled or not.
///
/// Feature values are left untouched, so signed and fractional values written by the
/// rescaler are accepted.
pub fn instance_label(line: &str) -> Result<&str> {
    line.split_whitespace()
        .next()
        .ok_or_else(|| SvmTextError::Parse("instance line has no label".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize_and_tokenize;

    #[test]
    fn encode_counts_occurrences_in_ascending_order() {
        let mut vocab = VocabularyIndex::growing();
        let vector = encode(&mut vocab, &["dog", "cat", "dog", "bird", "dog"]).unwrap();
        assert_eq!(vector.get(1), 3);
        assert_eq!(vector.get(2), 1);
        assert_eq!(vector.get(3), 1);
        assert_eq!(vector.get(9), 0);
        assert_eq!(vector.total_count(), 5);
        assert_eq!(vector.to_libsvm(), "1:3 2:1 3:1");
        let ids: Vec<FeatureId> = vector.iter().map(|(id, _)| id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn frozen_encoding_drops_unknown_tokens() {
        let mut vocab = VocabularyIndex::growing();
        encode(&mut vocab, &["cat", "dog"]).unwrap();
        vocab.freeze();

        let known = encode_frozen(&vocab, &["dog", "fish", "dog"]);
        assert_eq!(known.to_libsvm(), "2:2");

        let unknown = encode(&mut vocab, &["fish", "whale"]).unwrap();
        assert!(unknown.is_empty());
        assert!(is_blank(&unknown.to_libsvm()));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn parse_round_trips_serialised_vector() {
        let original: SparseFeatureVector = [(7, 1), (2, 4), (19, 2)].into_iter().collect();
        let text = original.to_libsvm();
        assert_eq!(text, "2:4 7:1 19:2");
        assert_eq!(SparseFeatureVector::parse(&text).unwrap(), original);
        assert_eq!(SparseFeatureVector::parse("2:4 7:1 19:2 ").unwrap(), original);
        assert_eq!(SparseFeatureVector::parse("   ").unwrap(), SparseFeatureVector::new());
    }

    #[test]
    fn parse_rejects_malformed_pairs() {
        for bad in ["1", "a:1", "1:x", "0:1", "3:1 2:1", "2:1 2:1"] {
            assert!(
                matches!(SparseFeatureVector::parse(bad), Err(SvmTextError::Parse(_))),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn instance_lines_carry_label_prefix() {
        let mut vocab = VocabularyIndex::growing();
        let x = encode(&mut vocab, &normalize_and_tokenize(b"cat dog")).unwrap();
        let y = encode(&mut vocab, &normalize_and_tokenize(b"dog bird")).unwrap();
        assert_eq!(format_instance(0, &x), "0 1:1 2:1");
        assert_eq!(format_instance(1, &y), "1 2:1 3:1");
        assert_eq!(format_instance(PLACEHOLDER_LABEL, &SparseFeatureVector::new()), "0");

        let (label, features) = parse_instance("1 2:1 3:1").unwrap();
        assert_eq!(label, "1");
        assert_eq!(features, y);
        let (label, features) = parse_instance("4").unwrap();
        assert_eq!(label, "4");
        assert!(features.is_empty());
        assert!(parse_instance("   ").is_err());
    }

    #[test]
    fn label_is_read_from_scaled_lines() {
        assert_eq!(instance_label("0 1:1 2:-1 3:-1 ").unwrap(), "0");
        assert_eq!(instance_label("  1 1:-1 2:1 3:0.5").unwrap(), "1");
        assert_eq!(instance_label("2").unwrap(), "2");
        assert!(matches!(instance_label(" \t"), Err(SvmTextError::Parse(_))));
        assert!(parse_instance("1 2:-1").is_err());
    }
}
