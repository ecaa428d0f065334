// Running external commands with captured output and a timeout

use crate::error::{Error, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long to wait for output pipes after killing a timed-out process
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A command line to execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs and dry runs
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished (or killed) command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when killed by a signal or by the timeout
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Executes commands. Builds go through this so tests can substitute a fake.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandOutput>;
}

/// Runs real child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(command = %spec.display(), "spawning");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::spawn(spec.program.clone(), e))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let mut timed_out = false;
        let exit_code = loop {
            if let Some(status) = child.try_wait()? {
                break status.code();
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    warn!(command = %spec.display(), timeout_secs = limit.as_secs(), "timed out, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    timed_out = true;
                    break None;
                }
            }
            thread::sleep(self.poll_interval);
        };

        // Grandchildren may keep the pipes open after a kill.
        let grace = if timed_out { Some(DRAIN_GRACE) } else { None };
        Ok(CommandOutput {
            exit_code,
            stdout: collect(stdout, grace),
            stderr: collect(stderr, grace),
            timed_out,
            duration: start.elapsed(),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn collect(rx: Option<mpsc::Receiver<String>>, grace: Option<Duration>) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    match grace {
        Some(grace) => rx.recv_timeout(grace).unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_spaces() {
        let spec = CommandSpec::new("sphinx-build")
            .args(["-b", "html"])
            .arg("docs/my source");
        assert_eq!(spec.display(), "sphinx-build -b html 'docs/my source'");
    }

    #[test]
    fn test_output_success() {
        let ok = CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(ok.success());

        let killed = CommandOutput {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!killed.success());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary-xyz"), None)
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_exit_code() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = runner.run(&spec, Some(Duration::from_secs(10))).unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sleep").arg("5");
        let output = runner.run(&spec, Some(Duration::from_millis(200))).unwrap();

        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert!(output.duration < Duration::from_secs(5));
    }
}
