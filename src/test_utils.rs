use std::cell::RefCell;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SvmTextError};
use crate::splitter::{read_lines, write_lines};
use crate::tools::{ExternalTools, RangeFile};

/// Writes an executable `/bin/sh` script and returns its path.
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut permissions = fs::metadata(&path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// In-process tools: svm-scale style rescaling, a marker model, and fixed probability rows.
#[derive(Debug, Default)]
pub(crate) struct FakeTools {
    /// Probability row emitted for every predicted instance, one column per class id.
    pub(crate) probabilities: Vec<f64>,
    /// Drops the final scaled line to simulate a misbehaving rescaler.
    pub(crate) truncate_scaled: bool,
    pub(crate) calls: RefCell<Vec<&'static str>>,
}

impl FakeTools {
    pub(crate) fn with_probabilities(probabilities: Vec<f64>) -> Self {
        Self {
            probabilities,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))
}

/// Rewrites `id:count` pairs the way svm-scale would for a `[-1, 1]` range: single
/// occurrences become `-1`, anything larger `0.5`. Each line keeps svm-scale's trailing space.
pub(crate) fn scale_line(line: &str) -> String {
    let mut fields = line.split_whitespace();
    let mut scaled = format!("{} ", fields.next().unwrap_or_default());
    for pair in fields {
        let (id, count) = pair.split_once(':').unwrap_or((pair, "1"));
        let value = if count == "1" { "-1" } else { "0.5" };
        let _ = write!(scaled, "{id}:{value} ");
    }
    scaled
}

impl ExternalTools for FakeTools {
    fn rescale(&self, input: &Path, range: RangeFile<'_>, output: &Path) -> Result<()> {
        self.calls.borrow_mut().push("scale");
        match range {
            RangeFile::Save(path) => write_text(path, "x\n0 1\n")?,
            RangeFile::Restore(path) => {
                fs::read(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?;
            }
        }
        let mut lines: Vec<String> = read_lines(input)?.iter().map(|line| scale_line(line)).collect();
        if self.truncate_scaled {
            lines.pop();
        }
        write_lines(output, lines.iter().map(String::as_str))
    }

    fn train(&self, scaled: &Path, model: &Path) -> Result<()> {
        self.calls.borrow_mut().push("train");
        let instances = read_lines(scaled)?.len();
        write_text(model, &format!("fake model trained on {instances} instances\n"))
    }

    fn predict(&self, instances: &Path, model: &Path, output: &Path) -> Result<()> {
        self.calls.borrow_mut().push("predict");
        fs::read(model).map_err(|err| SvmTextError::io(err, Some(model.to_path_buf())))?;
        let mut text = String::from("labels");
        for class_id in 0..self.probabilities.len() {
            let _ = write!(text, " {class_id}");
        }
        text.push('\n');
        let best = self
            .probabilities
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (idx, &p)| if p > best.1 { (idx, p) } else { best })
            .0;
        for _ in read_lines(instances)? {
            let _ = write!(text, "{best}");
            for p in &self.probabilities {
                let _ = write!(text, " {p}");
            }
            text.push('\n');
        }
        write_text(output, &text)
    }
}
