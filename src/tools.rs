//! Invocation of the external rescaling, training, and prediction programs.
//!
//! Programs are started directly from an argument vector, never through a shell, and block
//! the caller until they exit. A non-zero exit, a failure to start, or an expired timeout
//! becomes [`SvmTextError::ExternalTool`] carrying the command line and captured stderr.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::config::ToolConfig;
use crate::error::{Result, SvmTextError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Where the rescaler keeps its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFile<'a> {
    /// Compute the range from the input and write it here (corpus construction).
    Save(&'a Path),
    /// Reuse a range written earlier (inference and evaluation).
    Restore(&'a Path),
}

/// External collaborators consumed by the build and inference paths.
pub trait ExternalTools {
    /// Rescales every instance line of `input` into `output`, keeping line count and order.
    fn rescale(&self, input: &Path, range: RangeFile<'_>, output: &Path) -> Result<()>;

    /// Trains a probability-capable model from a scaled instance file.
    fn train(&self, scaled: &Path, model: &Path) -> Result<()>;

    /// Writes probability estimates for every instance in `instances` to `output`.
    fn predict(&self, instances: &Path, model: &Path, output: &Path) -> Result<()>;
}

impl<T: ExternalTools + ?Sized> ExternalTools for &T {
    fn rescale(&self, input: &Path, range: RangeFile<'_>, output: &Path) -> Result<()> {
        (**self).rescale(input, range, output)
    }

    fn train(&self, scaled: &Path, model: &Path) -> Result<()> {
        (**self).train(scaled, model)
    }

    fn predict(&self, instances: &Path, model: &Path, output: &Path) -> Result<()> {
        (**self).predict(instances, model, output)
    }
}

/// [`ExternalTools`] backed by the LIBSVM command line programs.
#[derive(Debug, Clone, Default)]
pub struct LibSvmTools {
    cfg: ToolConfig,
}

impl LibSvmTools {
    /// Creates a tool runner for the supplied configuration.
    #[must_use]
    pub fn new(cfg: ToolConfig) -> Self {
        Self { cfg }
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &ToolConfig {
        &self.cfg
    }

    fn run(&self, tool: &str, program: &Path, args: &[OsString], stdout: Option<&Path>) -> Result<()> {
        let command_line = describe(program, args);
        debug!("running {tool}: {command_line}");
        let failure = |status: String, stderr: String| SvmTextError::ExternalTool {
            tool: tool.to_owned(),
            command: command_line.clone(),
            status,
            stderr,
        };

        let mut stderr_sink = tempfile::tempfile().map_err(|err| SvmTextError::io(err, None))?;
        let stderr_handle = stderr_sink
            .try_clone()
            .map_err(|err| SvmTextError::io(err, None))?;
        let stdout = match stdout {
            Some(path) => Stdio::from(
                File::create(path).map_err(|err| SvmTextError::io(err, Some(path.to_path_buf())))?,
            ),
            None => Stdio::null(),
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::from(stderr_handle))
            .spawn()
            .map_err(|err| failure(format!("failed to start: {err}"), String::new()))?;

        let started = Instant::now();
        let status = match self.cfg.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout),
            None => child.wait().map(Some),
        }
        .map_err(|err| failure(format!("failed to wait: {err}"), String::new()))?;
        let stderr = read_captured(&mut stderr_sink);

        match status {
            Some(status) if status.success() => {
                debug!("{tool} finished in {:.2?}", started.elapsed());
                Ok(())
            }
            Some(status) => Err(failure(status.to_string(), stderr)),
            None => Err(failure(
                format!("killed after exceeding the {:.2?} timeout", started.elapsed()),
                stderr,
            )),
        }
    }
}

impl ExternalTools for LibSvmTools {
    fn rescale(&self, input: &Path, range: RangeFile<'_>, output: &Path) -> Result<()> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(lower) = self.cfg.scale_lower {
            args.extend([OsString::from("-l"), OsString::from(lower.to_string())]);
        }
        if let Some(upper) = self.cfg.scale_upper {
            args.extend([OsString::from("-u"), OsString::from(upper.to_string())]);
        }
        let (flag, range_path) = match range {
            RangeFile::Save(path) => ("-s", path),
            RangeFile::Restore(path) => ("-r", path),
        };
        args.push(flag.into());
        args.push(range_path.into());
        args.push(input.into());
        self.run("scale", &self.cfg.scale_program, &args, Some(output))
    }

    fn train(&self, scaled: &Path, model: &Path) -> Result<()> {
        let mut args: Vec<OsString> = vec!["-b".into(), "1".into()];
        args.extend(self.cfg.train_args.iter().map(OsString::from));
        args.push(scaled.into());
        args.push(model.into());
        self.run("train", &self.cfg.train_program, &args, None)
    }

    fn predict(&self, instances: &Path, model: &Path, output: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-b".into(),
            "1".into(),
            instances.into(),
            model.into(),
            output.into(),
        ];
        self.run("predict", &self.cfg.predict_program, &args, None)
    }
}

/// Waits for `child`, killing and reaping it once `timeout` has elapsed.
///
/// Returns `Ok(None)` when the process was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            // The process may exit between the poll and the kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(timeout));
    }
}

fn read_captured(sink: &mut File) -> String {
    let mut buffer = Vec::new();
    if sink.seek(SeekFrom::Start(0)).is_ok() && sink.read_to_end(&mut buffer).is_ok() {
        String::from_utf8_lossy(&buffer).into_owned()
    } else {
        String::new()
    }
}

fn describe(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::write_script;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn rescale_passes_range_mode_and_bounds() {
        let dir = tempdir().expect("tempdir");
        let echo = write_script(dir.path(), "echo-args", "printf '%s\\n' \"$@\"\n");
        let cfg = ToolConfig::builder()
            .scale_program(&echo)
            .scale_bounds(Some(0.0), Some(1.0))
            .build()
            .unwrap();
        let tools = LibSvmTools::new(cfg);
        let output = dir.path().join("out.txt");
        let range = dir.path().join("scale.range");
        let input = dir.path().join("corpus.svm");

        tools
            .rescale(&input, RangeFile::Save(&range), &output)
            .expect("rescale succeeds");
        let expected = format!("-l\n0\n-u\n1\n-s\n{}\n{}\n", range.display(), input.display());
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);

        tools
            .rescale(&input, RangeFile::Restore(&range), &output)
            .expect("rescale succeeds");
        assert!(fs::read_to_string(&output).unwrap().contains("-r\n"));
    }

    #[test]
    fn non_zero_exit_reports_tool_and_stderr() {
        let dir = tempdir().expect("tempdir");
        let failing = write_script(dir.path(), "fail", "echo 'model file missing' >&2\nexit 3\n");
        let cfg = ToolConfig::builder().predict_program(&failing).build().unwrap();
        let tools = LibSvmTools::new(cfg);
        let err = tools
            .predict(
                &dir.path().join("in"),
                &dir.path().join("model"),
                &dir.path().join("out"),
            )
            .expect_err("script exits non-zero");
        match err {
            SvmTextError::ExternalTool {
                tool,
                command,
                status,
                stderr,
            } => {
                assert_eq!(tool, "predict");
                assert!(command.contains("-b 1"));
                assert!(status.contains('3'));
                assert_eq!(stderr.trim(), "model file missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_reported_as_tool_failure() {
        let dir = tempdir().expect("tempdir");
        let cfg = ToolConfig::builder()
            .train_program(dir.path().join("no-such-program"))
            .build()
            .unwrap();
        let err = LibSvmTools::new(cfg)
            .train(&dir.path().join("train"), &dir.path().join("model"))
            .expect_err("program does not exist");
        assert!(matches!(
            err,
            SvmTextError::ExternalTool { status, .. } if status.starts_with("failed to start")
        ));
    }

    #[test]
    fn hung_process_is_killed_after_timeout() {
        let dir = tempdir().expect("tempdir");
        let sleeper = write_script(dir.path(), "sleeper", "exec sleep 30\n");
        let cfg = ToolConfig::builder()
            .train_program(&sleeper)
            .timeout(Some(Duration::from_millis(200)))
            .build()
            .unwrap();
        let started = Instant::now();
        let err = LibSvmTools::new(cfg)
            .train(&dir.path().join("train"), &dir.path().join("model"))
            .expect_err("process must time out");
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            err,
            SvmTextError::ExternalTool { status, .. } if status.contains("timeout")
        ));
    }
}
