//! Facilities for discovering labeled documents and loading them from disk.
//!
//! A corpus root holds one directory per label; every file below a label directory is a
//! document carrying that label.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{Result, SvmTextError};

/// A document path together with the label inferred from its directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LabeledDocument {
    /// Document location on disk.
    pub path: PathBuf,
    /// Name of the label directory containing the document.
    pub label: String,
}

/// Discovers labeled documents below `root`, sorted by path.
///
/// Sorting makes vocabulary id assignment reproducible regardless of how the platform
/// orders directory listings. Label directories are descended recursively unless
/// [`IngestConfig::recursive`] is `false`; symlink traversal is controlled through
/// [`IngestConfig::follow_symlinks`].
pub fn collect_documents<P: AsRef<Path>>(root: P, cfg: &IngestConfig) -> Result<Vec<LabeledDocument>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(SvmTextError::InvalidConfig(format!(
            "corpus directory {root:?} does not exist or is not a directory"
        )));
    }
    let max_depth = if cfg.recursive { usize::MAX } else { 2 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(cfg.follow_symlinks)
        .sort_by_file_name();

    let mut documents = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| SvmTextError::Internal(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match label_for(root, entry.path()) {
            Some(label) => documents.push(LabeledDocument {
                path: entry.path().to_path_buf(),
                label,
            }),
            None => warn!(
                "skipping {} (documents must live inside a label directory)",
                entry.path().display()
            ),
        }
    }
    if documents.is_empty() {
        return Err(SvmTextError::InvalidConfig(format!(
            "no labeled documents discovered below {root:?}"
        )));
    }
    documents.sort();
    Ok(documents)
}

/// Reads a document's raw bytes.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))
}

fn label_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let label = components.next()?;
    // A file directly below the root has no label directory.
    components.next()?;
    Some(label.as_os_str().to_string_lossy().into_owned())
}
