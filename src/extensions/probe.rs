// Python module availability checks

use crate::build::{CommandRunner, CommandSpec, ProcessRunner};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on one interpreter run
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

const FIND_SPEC_SCRIPT: &str = "\
import importlib.util, sys
for name in sys.argv[1:]:
    try:
        if importlib.util.find_spec(name) is not None:
            print(name)
    except Exception:
        pass
";

/// Answers which Python modules can be imported
pub trait AvailabilityProbe: Send + Sync {
    /// Return the subset of `modules` that is importable
    fn available(&self, modules: &[String]) -> HashSet<String>;
}

/// Probe that runs the configured Python interpreter once per query.
///
/// When the interpreter cannot be started, times out or fails, nothing can be
/// verified and every module is reported as available.
#[derive(Clone)]
pub struct PythonProbe {
    python: String,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl PythonProbe {
    pub fn new(python: impl Into<String>) -> Self {
        Self::with_runner(python, Arc::new(ProcessRunner::new()))
    }

    pub fn with_runner(python: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            python: python.into(),
            runner,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl AvailabilityProbe for PythonProbe {
    fn available(&self, modules: &[String]) -> HashSet<String> {
        if modules.is_empty() {
            return HashSet::new();
        }

        let spec = CommandSpec::new(self.python.as_str())
            .arg("-c")
            .arg(FIND_SPEC_SCRIPT)
            .args(modules.iter().cloned());

        let output = match self.runner.run(&spec, Some(self.timeout)) {
            Ok(output) if output.success() => output,
            Ok(output) => {
                warn!(
                    python = %self.python,
                    exit_code = ?output.exit_code,
                    timed_out = output.timed_out,
                    "python probe failed, assuming extensions are installed"
                );
                return modules.iter().cloned().collect();
            }
            Err(e) => {
                warn!(python = %self.python, error = %e, "python not available, skipping extension probe");
                return modules.iter().cloned().collect();
            }
        };

        let found: HashSet<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        debug!(
            requested = modules.len(),
            found = found.len(),
            "probed python modules"
        );
        found
    }
}

/// Probe backed by a fixed set of module names
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    modules: HashSet<String>,
}

impl StaticProbe {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

impl AvailabilityProbe for StaticProbe {
    fn available(&self, modules: &[String]) -> HashSet<String> {
        modules
            .iter()
            .filter(|m| self.modules.contains(*m))
            .cloned()
            .collect()
    }
}

/// Probe that reports every module as importable
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAvailable;

impl AvailabilityProbe for AssumeAvailable {
    fn available(&self, modules: &[String]) -> HashSet<String> {
        modules.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CommandOutput;
    use crate::error::Result;
    use std::sync::Mutex;

    #[test]
    fn test_static_probe() {
        let probe = StaticProbe::new(["sphinx.ext.autodoc"]);
        let found = probe.available(&[
            "sphinx.ext.autodoc".to_string(),
            "myst_parser".to_string(),
        ]);
        assert_eq!(found.len(), 1);
        assert!(found.contains("sphinx.ext.autodoc"));
    }

    #[test]
    fn test_assume_available() {
        let found = AssumeAvailable.available(&["anything".to_string()]);
        assert!(found.contains("anything"));
    }

    /// Replies with a canned output and records the requested timeout
    struct Scripted {
        output: CommandOutput,
        timeouts: Mutex<Vec<Option<Duration>>>,
    }

    impl Scripted {
        fn new(output: CommandOutput) -> Arc<Self> {
            Arc::new(Self {
                output,
                timeouts: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandRunner for Scripted {
        fn run(&self, _spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandOutput> {
            self.timeouts.lock().unwrap().push(timeout);
            Ok(self.output.clone())
        }
    }

    fn modules() -> Vec<String> {
        vec!["sphinx".to_string(), "myst_parser".to_string()]
    }

    #[test]
    fn test_python_probe_missing_interpreter_keeps_all() {
        let probe = PythonProbe::new("definitely-not-a-python-binary");
        let found = probe.available(&["sphinx".to_string()]);
        assert!(found.contains("sphinx"));
    }

    #[test]
    fn test_python_probe_empty_query() {
        let probe = PythonProbe::new("definitely-not-a-python-binary");
        assert!(probe.available(&[]).is_empty());
    }

    #[test]
    fn test_python_probe_reads_found_modules() {
        let runner = Scripted::new(CommandOutput {
            exit_code: Some(0),
            stdout: "sphinx\n".to_string(),
            ..Default::default()
        });
        let probe = PythonProbe::with_runner("python3", runner.clone())
            .with_timeout(Duration::from_secs(5));

        let found = probe.available(&modules());
        assert_eq!(found.len(), 1);
        assert!(found.contains("sphinx"));
        assert_eq!(
            *runner.timeouts.lock().unwrap(),
            vec![Some(Duration::from_secs(5))]
        );
    }

    #[test]
    fn test_python_probe_timeout_keeps_all() {
        let runner = Scripted::new(CommandOutput {
            exit_code: None,
            timed_out: true,
            ..Default::default()
        });
        let probe = PythonProbe::with_runner("python3", runner);
        assert_eq!(probe.available(&modules()).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_python_probe_hung_interpreter_is_killed() {
        use std::time::Instant;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("python");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let probe = PythonProbe::new(script.to_string_lossy().to_string())
            .with_timeout(Duration::from_millis(200));
        let start = Instant::now();
        let found = probe.available(&modules());
        assert_eq!(found.len(), 2);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
