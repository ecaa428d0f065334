// Environment and project health report

use crate::build::{CommandRunner, CommandSpec, MonorepoDocsBuilder, PackageConfig, WavePlan};
use crate::config::Config;
use crate::extensions::{ExtensionManager, ExtensionPlan, ExtensionRequest};
use crate::project::{Layout, ProjectAnalyzer, ProjectKind};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const VERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether an external tool could be run
#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub program: String,
    pub found: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageCheck {
    pub name: String,
    pub layout: Layout,
    pub module_count: usize,
    pub has_docs: bool,
    pub internal_deps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub sphinx_build: ToolCheck,
    pub python: ToolCheck,
    pub kind: Option<ProjectKind>,
    pub packages: Vec<PackageCheck>,
    pub extensions: ExtensionPlan,
    pub waves: WavePlan,
    pub cycles: Vec<Vec<String>>,
    /// Things that will make builds fail
    pub problems: Vec<String>,
    /// Things worth knowing that will not break a build
    pub notes: Vec<String>,
}

impl DoctorReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for tool in [&self.sphinx_build, &self.python] {
            let status = match (tool.found, &tool.version) {
                (true, Some(v)) => v.clone(),
                (true, None) => "found".to_string(),
                (false, _) => "NOT FOUND".to_string(),
            };
            out.push_str(&format!("{:<14} {}\n", tool.program, status));
        }

        if let Some(kind) = self.kind {
            let label = match kind {
                ProjectKind::SinglePackage => "single package",
                ProjectKind::Monorepo => "monorepo",
            };
            out.push_str(&format!("\nProject: {} ({} packages)\n", label, self.packages.len()));
            for p in &self.packages {
                out.push_str(&format!(
                    "  {:<28} {:<8} {:>4} modules  docs: {}\n",
                    p.name,
                    format!("{:?}", p.layout).to_lowercase(),
                    p.module_count,
                    if p.has_docs { "yes" } else { "no" }
                ));
            }
            if self.waves.waves.len() > 1 {
                out.push_str("\nBuild order:\n");
                for (i, wave) in self.waves.waves.iter().enumerate() {
                    out.push_str(&format!("  {}. {}\n", i + 1, wave.join(", ")));
                }
            }
        }

        out.push_str(&format!("\nExtensions ({}):\n", self.extensions.order.len()));
        for name in &self.extensions.order {
            out.push_str(&format!("  {}\n", name));
        }
        if !self.extensions.dropped.is_empty() {
            out.push_str("Dropped:\n");
            for d in &self.extensions.dropped {
                out.push_str(&format!("  {} ({:?})\n", d.name, d.reason));
            }
        }

        for note in &self.notes {
            out.push_str(&format!("\nnote: {}", note));
        }
        if !self.notes.is_empty() {
            out.push('\n');
        }
        if self.problems.is_empty() {
            out.push_str("\nNo problems found.\n");
        } else {
            out.push('\n');
            for problem in &self.problems {
                out.push_str(&format!("problem: {}\n", problem));
            }
        }
        out
    }
}

/// Gathers a [`DoctorReport`]
pub struct Doctor<'a> {
    config: &'a Config,
    manager: &'a ExtensionManager,
    runner: Arc<dyn CommandRunner>,
}

impl<'a> Doctor<'a> {
    pub fn new(config: &'a Config, manager: &'a ExtensionManager, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            manager,
            runner,
        }
    }

    pub fn run(&self, root: &Path) -> DoctorReport {
        let sphinx_build = self.tool(&self.config.build.sphinx_build);
        let python = self.tool(&self.config.build.python);
        let extensions = self.manager.plan(&ExtensionRequest::from_docs(&self.config.docs));

        let mut report = DoctorReport {
            sphinx_build,
            python,
            kind: None,
            packages: Vec::new(),
            extensions,
            waves: WavePlan::default(),
            cycles: Vec::new(),
            problems: Vec::new(),
            notes: Vec::new(),
        };

        if !report.sphinx_build.found {
            report.problems.push(format!(
                "`{}` not found; install sphinx into the docs environment",
                report.sphinx_build.program
            ));
        }
        if !report.python.found {
            report.notes.push(format!(
                "`{}` not found; extension availability could not be checked",
                report.python.program
            ));
        }
        for dropped in &report.extensions.dropped {
            report
                .notes
                .push(format!("extension {} disabled: {:?}", dropped.name, dropped.reason));
        }

        let project = match ProjectAnalyzer::new(self.config.clone()).analyze(root) {
            Ok(project) => project,
            Err(e) => {
                report.problems.push(e.to_string());
                return report;
            }
        };

        report.kind = Some(project.kind);
        let mut configs = Vec::with_capacity(project.packages.len());
        for package in &project.packages {
            let build = PackageConfig::from_package(package, self.config);
            let has_docs = build.conf_py().is_file();
            if !has_docs {
                report
                    .notes
                    .push(format!("{} has no docs yet; run `pydevelop-docs init`", package.name()));
            }
            if package.layout == Layout::Unknown {
                report
                    .notes
                    .push(format!("{}: no importable source package found", package.name()));
            }
            report.packages.push(PackageCheck {
                name: package.name().to_string(),
                layout: package.layout,
                module_count: package.module_count,
                has_docs,
                internal_deps: package.internal_deps.clone(),
            });
            configs.push(build);
        }

        report.waves = MonorepoDocsBuilder::plan_waves(&configs);
        report.cycles = MonorepoDocsBuilder::find_cycles(&configs);
        for cycle in &report.cycles {
            report
                .problems
                .push(format!("dependency cycle: {}", cycle.join(" <-> ")));
        }

        report
    }

    fn tool(&self, program: &str) -> ToolCheck {
        let spec = CommandSpec::new(program).arg("--version");
        match self.runner.run(&spec, Some(VERSION_TIMEOUT)) {
            Ok(output) => {
                let found = output.success();
                let text = if output.stdout.trim().is_empty() {
                    output.stderr
                } else {
                    output.stdout
                };
                ToolCheck {
                    program: program.to_string(),
                    found,
                    version: text.lines().next().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
                }
            }
            Err(_) => ToolCheck {
                program: program.to_string(),
                found: false,
                version: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CommandOutput;
    use crate::error::{Error, Result};
    use crate::extensions::{AssumeAvailable, ExtensionCatalog};
    use std::fs;
    use tempfile::TempDir;

    /// Pretends only the listed programs exist
    struct Installed(Vec<&'static str>);

    impl CommandRunner for Installed {
        fn run(&self, spec: &CommandSpec, _timeout: Option<Duration>) -> Result<CommandOutput> {
            if self.0.contains(&spec.program.as_str()) {
                Ok(CommandOutput {
                    exit_code: Some(0),
                    stdout: format!("{} 7.2.6\n", spec.program),
                    ..Default::default()
                })
            } else {
                Err(Error::spawn(
                    spec.program.clone(),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ))
            }
        }
    }

    fn manager() -> ExtensionManager {
        ExtensionManager::new(ExtensionCatalog::builtin().unwrap(), Box::new(AssumeAvailable))
    }

    fn add_package(root: &Path, dir: &str, name: &str, deps: &[&str]) {
        let pkg = root.join(dir);
        let import = name.replace('-', "_");
        fs::create_dir_all(pkg.join("src").join(&import)).unwrap();
        fs::write(pkg.join("src").join(&import).join("__init__.py"), "").unwrap();
        let deps: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
        fs::write(
            pkg.join("pyproject.toml"),
            format!("[project]\nname = \"{}\"\ndependencies = [{}]\n", name, deps.join(", ")),
        )
        .unwrap();
    }

    #[test]
    fn test_healthy_single_package() {
        let dir = TempDir::new().unwrap();
        add_package(dir.path(), ".", "solo", &[]);
        let config = Config::default();
        let mgr = manager();
        let doctor = Doctor::new(&config, &mgr, Arc::new(Installed(vec!["sphinx-build", "python3"])));

        let report = doctor.run(dir.path());
        assert!(report.is_healthy(), "{:?}", report.problems);
        assert_eq!(report.kind, Some(ProjectKind::SinglePackage));
        assert_eq!(report.sphinx_build.version.as_deref(), Some("sphinx-build 7.2.6"));
        assert!(!report.packages[0].has_docs);
        assert!(report.notes.iter().any(|n| n.contains("run `pydevelop-docs init`")));
    }

    #[test]
    fn test_missing_sphinx_is_a_problem() {
        let dir = TempDir::new().unwrap();
        add_package(dir.path(), ".", "solo", &[]);
        let config = Config::default();
        let mgr = manager();
        let doctor = Doctor::new(&config, &mgr, Arc::new(Installed(vec!["python3"])));

        let report = doctor.run(dir.path());
        assert!(!report.is_healthy());
        assert!(!report.sphinx_build.found);
        assert!(report.render_text().contains("NOT FOUND"));
    }

    /// Every program starts but never answers `--version`
    struct Hangs;

    impl CommandRunner for Hangs {
        fn run(&self, _spec: &CommandSpec, _timeout: Option<Duration>) -> Result<CommandOutput> {
            Ok(CommandOutput {
                exit_code: None,
                timed_out: true,
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_hung_tool_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        add_package(dir.path(), ".", "solo", &[]);
        let config = Config::default();
        let mgr = manager();
        let doctor = Doctor::new(&config, &mgr, Arc::new(Hangs));

        let report = doctor.run(dir.path());
        assert!(!report.sphinx_build.found);
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_cycle_reported() {
        let dir = TempDir::new().unwrap();
        add_package(dir.path(), "packages/a", "pkg-a", &["pkg-b"]);
        add_package(dir.path(), "packages/b", "pkg-b", &["pkg-a"]);
        add_package(dir.path(), "packages/c", "pkg-c", &["pkg-a"]);
        let config = Config::default();
        let mgr = manager();
        let doctor = Doctor::new(&config, &mgr, Arc::new(Installed(vec!["sphinx-build", "python3"])));

        let report = doctor.run(dir.path());
        assert_eq!(report.kind, Some(ProjectKind::Monorepo));
        assert_eq!(report.cycles, vec![vec!["pkg-a".to_string(), "pkg-b".to_string()]]);
        assert_eq!(report.waves.cycle.len(), 3);
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_unanalyzable_root() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let doctor = Doctor::new(&config, &mgr, Arc::new(Installed(vec!["sphinx-build", "python3"])));

        let report = doctor.run(dir.path());
        assert!(report.kind.is_none());
        assert_eq!(report.problems.len(), 1);
    }
}
