// Project discovery: single packages and monorepos

pub mod layout;
pub mod pyproject;

pub use layout::*;
pub use pyproject::*;

use crate::config::Config;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Shape of the repository being documented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    SinglePackage,
    Monorepo,
}

/// One documentable Python package
#[derive(Debug, Clone, Serialize)]
pub struct PythonPackage {
    pub metadata: PackageMetadata,
    /// Absolute path of the directory holding pyproject.toml
    pub root: PathBuf,
    pub layout: Layout,
    /// Source package directories relative to `root`
    pub source_dirs: Vec<PathBuf>,
    pub module_count: usize,
    /// Names of other packages in the same repository this one depends on
    pub internal_deps: Vec<String>,
}

impl PythonPackage {
    /// Load a package from a directory containing pyproject.toml
    pub fn load(dir: &Path, docs_dir: &Path) -> Result<Self> {
        let metadata = read_pyproject(&dir.join("pyproject.toml"))?;
        let found = detect_layout(dir, &metadata.import_name(), docs_dir);
        if found.layout == Layout::Unknown {
            warn!(package = %metadata.name, "no importable source package found");
        }

        Ok(Self {
            metadata,
            root: dir.to_path_buf(),
            layout: found.layout,
            source_dirs: found.source_dirs,
            module_count: found.module_count,
            internal_deps: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// A discovered repository
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub root: PathBuf,
    pub kind: ProjectKind,
    /// Packages sorted by name
    pub packages: Vec<PythonPackage>,
    /// Root pyproject metadata, when the root declares a project of its own
    pub root_metadata: Option<PackageMetadata>,
}

impl Project {
    pub fn is_monorepo(&self) -> bool {
        self.kind == ProjectKind::Monorepo
    }

    /// Find a package by name (normalized comparison)
    pub fn package(&self, name: &str) -> Option<&PythonPackage> {
        let wanted = normalize_name(name);
        self.packages
            .iter()
            .find(|p| p.metadata.normalized_name() == wanted)
    }

    /// Name used for hub titles
    pub fn display_name(&self) -> String {
        self.root_metadata
            .as_ref()
            .map(|m| m.name.clone())
            .or_else(|| {
                self.root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Project".to_string())
    }
}

/// Detects project kind and loads every package
pub struct ProjectAnalyzer {
    config: Config,
}

impl ProjectAnalyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Analyze the repository at `root`
    pub fn analyze(&self, root: &Path) -> Result<Project> {
        if !root.exists() {
            return Err(Error::PathNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let mut packages = self.discover_packages(&root)?;
        let root_pyproject = root.join("pyproject.toml");

        let (kind, root_metadata) = if !packages.is_empty() {
            let meta = if root_pyproject.is_file() {
                read_pyproject(&root_pyproject)
                    .map_err(|e| debug!(error = %e, "monorepo root has no usable project table"))
                    .ok()
            } else {
                None
            };
            (ProjectKind::Monorepo, meta)
        } else if root_pyproject.is_file() {
            let package = PythonPackage::load(&root, &self.config.docs.dir)?;
            let meta = package.metadata.clone();
            packages.push(package);
            (ProjectKind::SinglePackage, Some(meta))
        } else {
            return Err(Error::discovery(format!(
                "no pyproject.toml found in {} or its package directories",
                root.display()
            )));
        };

        link_internal_deps(&mut packages);
        packages.sort_by(|a, b| a.name().cmp(b.name()));

        debug!(
            root = %root.display(),
            kind = ?kind,
            packages = packages.len(),
            "project analyzed"
        );

        Ok(Project {
            root,
            kind,
            packages,
            root_metadata,
        })
    }

    /// Load every package matched by the monorepo glob patterns.
    ///
    /// Directories without pyproject.toml are skipped; unreadable ones are
    /// skipped with a warning.
    fn discover_packages(&self, root: &Path) -> Result<Vec<PythonPackage>> {
        let excluded: HashSet<String> = self
            .config
            .monorepo
            .exclude
            .iter()
            .map(|n| normalize_name(n))
            .collect();

        let mut seen = HashSet::new();
        let mut packages = Vec::new();

        for dir in self.candidate_dirs(root)? {
            if !seen.insert(dir.clone()) {
                continue;
            }
            if !dir.join("pyproject.toml").is_file() {
                debug!(dir = %dir.display(), "no pyproject.toml, skipping");
                continue;
            }

            match PythonPackage::load(&dir, &self.config.docs.dir) {
                Ok(package) if excluded.contains(&package.metadata.normalized_name()) => {
                    debug!(package = %package.name(), "excluded by config");
                }
                Ok(package) => packages.push(package),
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping package"),
            }
        }

        Ok(packages)
    }

    fn candidate_dirs(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        let mut dirs = Vec::new();

        for pattern in &self.config.monorepo.packages {
            let full = format!("{}/{}", escaped_root, pattern.trim_start_matches("./"));
            for entry in glob::glob(&full)? {
                match entry {
                    Ok(path) if path.is_dir() && path != root => dirs.push(path),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "unreadable path while globbing"),
                }
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}

/// Fill `internal_deps` with dependencies that name another package in the set
fn link_internal_deps(packages: &mut [PythonPackage]) {
    let names: Vec<(String, String)> = packages
        .iter()
        .map(|p| (p.metadata.normalized_name(), p.metadata.name.clone()))
        .collect();

    for package in packages.iter_mut() {
        let own = package.metadata.normalized_name();
        package.internal_deps = package
            .metadata
            .dependencies
            .iter()
            .filter(|d| **d != own)
            .filter_map(|d| names.iter().find(|(n, _)| n == d).map(|(_, raw)| raw.clone()))
            .collect();
    }
}
