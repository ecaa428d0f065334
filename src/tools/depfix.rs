// Checking and fixing a package's docs requirements

use crate::config::Config;
use crate::error::Result;
use crate::extensions::{DropReason, ExtensionManager, ExtensionPlan};
use crate::output::required_packages;
use crate::project::{normalize_name, requirement_name, PythonPackage};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub package: String,
    pub requirements_path: PathBuf,
    /// Distributions the docs build needs
    pub required: Vec<String>,
    /// Normalized names already listed in requirements.txt or the `docs` extra
    pub declared: Vec<String>,
    /// Required but not declared
    pub missing: Vec<String>,
    /// Required but not importable by the configured interpreter
    pub unavailable: Vec<String>,
}

impl DependencyReport {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty() && self.unavailable.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{}: {} required", self.package, self.required.len());
        if self.is_satisfied() {
            out.push_str(", all declared and installed\n");
            return out;
        }
        out.push('\n');
        if !self.missing.is_empty() {
            out.push_str(&format!(
                "  not in {}: {}\n",
                self.requirements_path.display(),
                self.missing.join(", ")
            ));
        }
        if !self.unavailable.is_empty() {
            out.push_str(&format!("  not installed: {}\n", self.unavailable.join(", ")));
        }
        out
    }
}

/// Compares what the docs need with what the package declares
pub struct DependencyChecker<'a> {
    config: &'a Config,
    manager: &'a ExtensionManager,
}

impl<'a> DependencyChecker<'a> {
    pub fn new(config: &'a Config, manager: &'a ExtensionManager) -> Self {
        Self { config, manager }
    }

    pub fn requirements_path(&self, package: &PythonPackage) -> PathBuf {
        package.root.join(&self.config.docs.dir).join("requirements.txt")
    }

    /// Check `package` against the extensions in `plan`.
    ///
    /// Extensions the plan dropped for being uninstalled still count as
    /// required; they are what `deps --fix` should add.
    pub fn check(&self, package: &PythonPackage, plan: &ExtensionPlan) -> Result<DependencyReport> {
        let not_installed: Vec<String> = plan
            .dropped
            .iter()
            .filter(|d| d.reason == DropReason::Unavailable)
            .map(|d| d.name.clone())
            .collect();
        let mut wanted = plan.order.clone();
        wanted.extend(not_installed.iter().cloned());

        let required = required_packages(self.config, self.manager, &wanted, &[]);

        let requirements_path = self.requirements_path(package);
        let mut declared: BTreeSet<String> = read_requirement_names(&requirements_path)?;
        declared.extend(
            package
                .metadata
                .docs_requirements
                .iter()
                .filter_map(|line| requirement_name(line)),
        );

        let missing: Vec<String> = required
            .iter()
            .filter(|r| !declared.contains(&normalize_name(r)))
            .cloned()
            .collect();

        let mut unavailable: BTreeSet<String> = self
            .manager
            .catalog()
            .packages_for(&not_installed)
            .into_iter()
            .collect();
        let theme = self.config.docs.theme;
        let core = vec!["sphinx".to_string(), theme.html_theme().to_string()];
        let found = self.manager.probe().available(&core);
        if !found.contains("sphinx") {
            unavailable.insert("sphinx".to_string());
        }
        if !found.contains(theme.html_theme()) {
            unavailable.insert(theme.package().to_string());
        }

        debug!(package = %package.name(), missing = missing.len(), unavailable = unavailable.len(), "dependencies checked");

        Ok(DependencyReport {
            package: package.name().to_string(),
            requirements_path,
            required,
            declared: declared.into_iter().collect(),
            missing,
            unavailable: unavailable.into_iter().collect(),
        })
    }

    /// Append the report's missing packages to `requirements_path`, keeping
    /// existing lines. Returns the lines added.
    pub fn fix(&self, report: &DependencyReport, requirements_path: &Path, dry_run: bool) -> Result<Vec<String>> {
        if report.missing.is_empty() {
            return Ok(Vec::new());
        }
        let added = report.missing.clone();
        if dry_run {
            return Ok(added);
        }

        let mut contents = if requirements_path.exists() {
            fs::read_to_string(requirements_path)?
        } else {
            String::new()
        };
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        for line in &added {
            contents.push_str(line);
            contents.push('\n');
        }

        if let Some(parent) = requirements_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(requirements_path, contents)?;
        info!(path = %requirements_path.display(), added = added.len(), "requirements updated");
        Ok(added)
    }
}

/// Normalized names listed in a requirements file; empty if it does not exist
fn read_requirement_names(path: &Path) -> Result<BTreeSet<String>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .filter_map(requirement_name)
        .collect())
}
