// Scripted command runner for build tests

use crate::build::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Succeeds unless told otherwise. Packages are identified by the name of
/// the working directory the command runs in.
#[derive(Default, Clone)]
pub struct FakeRunner {
    exit_codes: HashMap<String, i32>,
    timeouts: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRunner {
    pub fn fail(mut self, package: &str, code: i32) -> Self {
        self.exit_codes.insert(package.to_string(), code);
        self
    }

    pub fn time_out(mut self, package: &str) -> Self {
        self.timeouts.push(package.to_string());
        self
    }

    /// Packages run so far, in call order
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec, _timeout: Option<Duration>) -> Result<CommandOutput> {
        let package = spec
            .cwd
            .as_ref()
            .and_then(|d| d.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(package.clone());

        Ok(CommandOutput {
            exit_code: if self.timeouts.contains(&package) {
                None
            } else {
                Some(self.exit_codes.get(&package).copied().unwrap_or(0))
            },
            stdout: format!("built {}\n", package),
            stderr: String::new(),
            timed_out: self.timeouts.contains(&package),
            duration: Duration::from_millis(1),
        })
    }
}
