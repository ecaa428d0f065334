// Building a single package's docs with sphinx-build

use crate::build::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::Config;
use crate::error::Result;
use crate::project::PythonPackage;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Build inputs for one package
#[derive(Debug, Clone, Serialize)]
pub struct PackageConfig {
    pub name: String,
    pub root: PathBuf,
    /// Directory holding conf.py
    pub docs_source: PathBuf,
    /// Parent of the per-builder output directories
    pub build_dir: PathBuf,
    /// In-repo packages that must build first
    pub dependencies: Vec<String>,
}

impl PackageConfig {
    pub fn from_package(package: &PythonPackage, config: &Config) -> Self {
        Self {
            name: package.name().to_string(),
            root: package.root.clone(),
            docs_source: config.docs.source_path(&package.root),
            build_dir: config.docs.build_path(&package.root),
            dependencies: package.internal_deps.clone(),
        }
    }

    pub fn output_dir(&self, builder: &str) -> PathBuf {
        self.build_dir.join(builder)
    }

    pub fn conf_py(&self) -> PathBuf {
        self.docs_source.join("conf.py")
    }
}

/// Outcome of one package build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failed { exit_code: Option<i32> },
    TimedOut,
    /// A dependency failed, so this package never ran
    Blocked { by: String },
    /// Part of a dependency cycle
    Cycle,
    /// Dry run
    Skipped,
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success)
    }

    /// Whether this status should fail the overall run
    pub fn is_failure(&self) -> bool {
        !matches!(self, BuildStatus::Success | BuildStatus::Skipped)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "ok"),
            BuildStatus::Failed { exit_code: Some(code) } => write!(f, "failed (exit {})", code),
            BuildStatus::Failed { exit_code: None } => write!(f, "failed"),
            BuildStatus::TimedOut => write!(f, "timed out"),
            BuildStatus::Blocked { by } => write!(f, "blocked by {}", by),
            BuildStatus::Cycle => write!(f, "dependency cycle"),
            BuildStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub package: String,
    pub status: BuildStatus,
    pub duration: Duration,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub command: Option<String>,
}

impl BuildResult {
    /// A result for a package that never ran
    pub fn not_run(package: impl Into<String>, status: BuildStatus) -> Self {
        Self {
            package: package.into(),
            status,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
            command: None,
        }
    }
}

/// Results of a build run, one entry per package
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    pub results: Vec<BuildResult>,
}

impl BuildSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failure()).count()
    }

    pub fn get(&self, package: &str) -> Option<&BuildResult> {
        self.results.iter().find(|r| r.package == package)
    }

    /// Process exit code: 1 if any package failed, timed out, was blocked
    /// or sits in a cycle
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 {
            1
        } else {
            0
        }
    }

    pub fn render_text(&self) -> String {
        let width = self
            .results
            .iter()
            .map(|r| r.package.len())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&format!(
                "{:<width$}  {:<24} {:>7.1}s\n",
                result.package,
                result.status.to_string(),
                result.duration.as_secs_f64(),
                width = width
            ));
        }
        out.push_str(&format!(
            "\n{} built, {} failed, {} total\n",
            self.succeeded(),
            self.failed(),
            self.results.len()
        ));
        out
    }
}

/// sphinx-build flags shared by every package in a run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub sphinx_build: String,
    pub builder: String,
    pub warnings_as_errors: bool,
    pub keep_going: bool,
    pub quiet: bool,
    pub jobs: Option<String>,
    pub timeout: Duration,
    /// Remove the output directory first
    pub clean: bool,
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        let build = &config.build;
        Self {
            sphinx_build: build.sphinx_build.clone(),
            builder: build.builder.clone(),
            warnings_as_errors: build.warnings_as_errors,
            keep_going: build.keep_going,
            quiet: build.quiet,
            jobs: build.jobs.clone(),
            timeout: Duration::from_secs(build.timeout_secs),
            clean: false,
        }
    }
}

/// Runs sphinx-build for one package at a time
#[derive(Clone)]
pub struct SphinxBuilder {
    runner: Arc<dyn CommandRunner>,
    options: BuildOptions,
}

impl SphinxBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>, options: BuildOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The sphinx-build invocation for `package`
    pub fn command(&self, package: &PackageConfig) -> CommandSpec {
        let opts = &self.options;
        let mut spec = CommandSpec::new(&opts.sphinx_build)
            .args(["-b", opts.builder.as_str()])
            .current_dir(&package.root);
        if opts.warnings_as_errors {
            spec = spec.arg("-W");
            if opts.keep_going {
                spec = spec.arg("--keep-going");
            }
        }
        if let Some(jobs) = &opts.jobs {
            spec = spec.args(["-j", jobs.as_str()]);
        }
        if opts.quiet {
            spec = spec.arg("-q");
        }
        spec.arg(package.docs_source.to_string_lossy())
            .arg(package.output_dir(&opts.builder).to_string_lossy())
    }

    /// Build one package. Never returns an error; every problem becomes a
    /// failed status so sibling builds carry on.
    pub fn build(&self, package: &PackageConfig) -> BuildResult {
        let conf = package.conf_py();
        if !conf.is_file() {
            warn!(package = %package.name, path = %conf.display(), "conf.py missing, run `init` first");
            let mut result = BuildResult::not_run(&package.name, BuildStatus::Failed { exit_code: None });
            result.stderr = format!("{} not found", conf.display());
            return result;
        }

        if self.options.clean {
            if let Err(e) = clean_dir(&package.output_dir(&self.options.builder)) {
                warn!(package = %package.name, error = %e, "could not clean output directory");
            }
        }

        let spec = self.command(package);
        let start = Instant::now();
        let output = self.runner.run(&spec, Some(self.options.timeout));

        let mut result = BuildResult {
            package: package.name.clone(),
            status: BuildStatus::Success,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
            command: Some(spec.display()),
        };

        match output {
            Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
                timed_out,
                duration,
            }) => {
                result.status = if timed_out {
                    BuildStatus::TimedOut
                } else if exit_code == Some(0) {
                    BuildStatus::Success
                } else {
                    BuildStatus::Failed { exit_code }
                };
                result.duration = duration;
                result.stdout = stdout;
                result.stderr = stderr;
            }
            Err(e) => {
                result.status = BuildStatus::Failed { exit_code: None };
                result.duration = start.elapsed();
                result.stderr = e.to_string();
            }
        }

        info!(
            package = %package.name,
            status = %result.status,
            secs = result.duration.as_secs_f64(),
            "build finished"
        );
        result
    }
}

/// Remove a build output directory if present. Returns whether anything was removed.
pub fn clean_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(dir)?;
    debug!(dir = %dir.display(), "removed");
    Ok(true)
}
