// Docs scaffolding: conf.py, index.rst, Makefile and friends
//
// Planning is pure; writing only happens in `DocsInitializer::init` and only
// after the target directory has been checked.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extensions::{ExtensionManager, ExtensionPlan, ExtensionRequest};
use crate::output::relative_path;
use crate::output::templates::TemplateEngine;
use crate::project::{requirement_name, PythonPackage};
use crate::sphinx::{IntersphinxTarget, SphinxConfigBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const AUTOAPI: &str = "autoapi.extension";

/// A file the scaffold will write
#[derive(Debug, Clone)]
pub struct ScaffoldFile {
    pub path: PathBuf,
    pub contents: String,
}

/// All files for one docs directory
#[derive(Debug, Clone)]
pub struct ScaffoldPlan {
    pub docs_dir: PathBuf,
    pub files: Vec<ScaffoldFile>,
    pub extensions: ExtensionPlan,
}

impl ScaffoldPlan {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

/// How `init` treats existing files
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    pub force: bool,
    pub dry_run: bool,
}

/// What `init` did (or would do, for a dry run)
#[derive(Debug, Clone, Default)]
pub struct InitReport {
    pub docs_dir: PathBuf,
    pub written: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
    pub dry_run: bool,
}

impl InitReport {
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                "Would write {} files to {}",
                self.written.len(),
                self.docs_dir.display()
            )
        } else {
            format!(
                "Wrote {} files to {} ({} overwritten)",
                self.written.len(),
                self.docs_dir.display(),
                self.overwritten.len()
            )
        }
    }
}

/// Refuse to touch a non-empty docs directory unless forced
pub fn ensure_writable(docs_dir: &Path, force: bool) -> Result<()> {
    if force || !docs_dir.exists() {
        return Ok(());
    }
    let non_empty = fs::read_dir(docs_dir)?.next().is_some();
    if non_empty {
        return Err(Error::AlreadyInitialized(docs_dir.to_path_buf()));
    }
    Ok(())
}

/// Write every file of a plan, honouring dry-run
pub fn write_plan(plan: &ScaffoldPlan, dry_run: bool) -> Result<InitReport> {
    let mut report = InitReport {
        docs_dir: plan.docs_dir.clone(),
        dry_run,
        ..Default::default()
    };

    for file in &plan.files {
        if dry_run {
            report.written.push(file.path.clone());
            continue;
        }
        if let Some(parent) = file.path.parent() {
            fs::create_dir_all(parent)?;
        }
        if file.path.exists() {
            report.overwritten.push(file.path.clone());
        }
        fs::write(&file.path, &file.contents)?;
        debug!(path = %file.path.display(), "wrote file");
        report.written.push(file.path.clone());
    }

    Ok(report)
}

/// Generates docs scaffolding for a package
pub struct DocsInitializer<'a> {
    config: &'a Config,
    manager: &'a ExtensionManager,
    engine: TemplateEngine,
}

impl<'a> DocsInitializer<'a> {
    pub fn new(config: &'a Config, manager: &'a ExtensionManager) -> Result<Self> {
        Ok(Self {
            config,
            manager,
            engine: TemplateEngine::new()?,
        })
    }

    /// Plan the scaffold for `package`. `siblings` are the monorepo packages
    /// it depends on; each becomes an intersphinx target.
    pub fn plan(&self, package: &PythonPackage, siblings: &[&PythonPackage]) -> Result<ScaffoldPlan> {
        let docs = &self.config.docs;
        let docs_dir = package.root.join(&docs.dir);
        let source = docs.source_path(&package.root);
        let html = docs.build_path(&package.root).join("html");

        let extensions = self.manager.plan(&ExtensionRequest::from_docs(docs));

        let mut builder = SphinxConfigBuilder::new(package, self.config).with_plan(&extensions);
        for sibling in siblings {
            let target = docs.build_path(&sibling.root).join("html");
            builder = builder.with_intersphinx(
                sibling.name(),
                IntersphinxTarget::local(
                    relative_path(&html, &target),
                    format!("{}/objects.inv", relative_path(&source, &target)),
                ),
            );
        }
        let conf = builder.build();

        let has_autoapi = extensions.contains(AUTOAPI);
        let mut files = vec![
            ScaffoldFile {
                path: source.join("conf.py"),
                contents: self.engine.render_conf_py(&conf)?,
            },
            ScaffoldFile {
                path: source.join("index.rst"),
                contents: self.engine.render_index(
                    &conf.project,
                    package.metadata.description.as_deref(),
                    has_autoapi,
                )?,
            },
            ScaffoldFile {
                path: source.join("changelog.rst"),
                contents: self.engine.render_changelog(&conf.release)?,
            },
        ];

        if !has_autoapi {
            let modules: Vec<String> = package
                .source_dirs
                .iter()
                .filter_map(|d| d.file_name().and_then(|n| n.to_str()))
                .map(str::to_string)
                .collect();
            files.push(ScaffoldFile {
                path: source.join("api.rst"),
                contents: self.engine.render_api(&modules)?,
            });
        }

        files.extend([
            ScaffoldFile {
                path: source.join("_static").join(".gitkeep"),
                contents: String::new(),
            },
            ScaffoldFile {
                path: source.join("_templates").join(".gitkeep"),
                contents: String::new(),
            },
            ScaffoldFile {
                path: docs_dir.join("Makefile"),
                contents: self.engine.render_makefile(self.config)?,
            },
            ScaffoldFile {
                path: docs_dir.join("requirements.txt"),
                contents: self
                    .engine
                    .render_requirements(&self.requirements(package, &extensions))?,
            },
            ScaffoldFile {
                path: docs_dir.join(".gitignore"),
                contents: self.engine.render_gitignore(self.config)?,
            },
        ]);

        Ok(ScaffoldPlan {
            docs_dir,
            files,
            extensions,
        })
    }

    /// Scaffold docs for `package`.
    ///
    /// A non-empty docs directory is left untouched unless `force` is set.
    pub fn init(
        &self,
        package: &PythonPackage,
        siblings: &[&PythonPackage],
        options: InitOptions,
    ) -> Result<InitReport> {
        let docs_dir = package.root.join(&self.config.docs.dir);
        ensure_writable(&docs_dir, options.force)?;

        let plan = self.plan(package, siblings)?;
        let report = write_plan(&plan, options.dry_run)?;
        info!(package = %package.name(), files = report.written.len(), dry_run = options.dry_run, "docs scaffolded");
        Ok(report)
    }

    /// Requirement lines for building the docs, one per distribution.
    ///
    /// Lines from the package's own `docs` extra win over bare names.
    pub fn requirements(&self, package: &PythonPackage, plan: &ExtensionPlan) -> Vec<String> {
        required_packages(
            self.config,
            self.manager,
            &plan.order,
            &package.metadata.docs_requirements,
        )
    }
}

/// Distributions needed to build docs with `extensions`, merged with
/// declared requirement lines and sorted by name
pub fn required_packages(
    config: &Config,
    manager: &ExtensionManager,
    extensions: &[String],
    declared: &[String],
) -> Vec<String> {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    by_name.insert("sphinx".to_string(), "sphinx".to_string());
    let theme = config.docs.theme.package().to_string();
    by_name.insert(theme.clone(), theme);
    for package in manager.catalog().packages_for(extensions) {
        by_name
            .entry(crate::project::normalize_name(&package))
            .or_insert(package);
    }
    for line in declared {
        if let Some(name) = requirement_name(line) {
            by_name.insert(name, line.trim().to_string());
        }
    }
    by_name.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{AssumeAvailable, ExtensionCatalog};
    use crate::project::{Layout, PackageMetadata};
    use tempfile::TempDir;

    fn manager() -> ExtensionManager {
        ExtensionManager::new(ExtensionCatalog::builtin().unwrap(), Box::new(AssumeAvailable))
    }

    fn package(root: &Path) -> PythonPackage {
        PythonPackage {
            metadata: PackageMetadata {
                name: "haive-core".to_string(),
                version: Some("0.3.0".to_string()),
                description: Some("Core primitives".to_string()),
                docs_requirements: vec!["sphinx>=7.2".to_string()],
                ..Default::default()
            },
            root: root.to_path_buf(),
            layout: Layout::Src,
            source_dirs: vec![PathBuf::from("src/haive_core")],
            module_count: 1,
            internal_deps: Vec::new(),
        }
    }

    #[test]
    fn test_plan_lists_expected_files() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let plan = init.plan(&package(dir.path()), &[]).unwrap();
        let paths: Vec<&Path> = plan.paths().collect();

        let source = dir.path().join("docs/source");
        assert!(paths.contains(&source.join("conf.py").as_path()));
        assert!(paths.contains(&source.join("index.rst").as_path()));
        assert!(paths.contains(&dir.path().join("docs/Makefile").as_path()));
        assert!(paths.contains(&dir.path().join("docs/requirements.txt").as_path()));
        // standard profile uses AutoAPI, so no hand-written api page
        assert!(!paths.contains(&source.join("api.rst").as_path()));
    }

    #[test]
    fn test_minimal_profile_adds_api_page() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.docs.profile = crate::extensions::Profile::Minimal;
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let plan = init.plan(&package(dir.path()), &[]).unwrap();
        let api = plan
            .files
            .iter()
            .find(|f| f.path.ends_with("api.rst"))
            .unwrap();
        assert!(api.contents.contains(".. automodule:: haive_core"));
    }

    #[test]
    fn test_requirements_prefer_declared_lines() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let pkg = package(dir.path());
        let plan = init.plan(&pkg, &[]).unwrap();
        let reqs = init.requirements(&pkg, &plan.extensions);

        assert!(reqs.contains(&"sphinx>=7.2".to_string()));
        assert!(!reqs.contains(&"sphinx".to_string()));
        assert!(reqs.contains(&"furo".to_string()));
        assert!(reqs.contains(&"sphinx-autoapi".to_string()));
    }

    #[test]
    fn test_init_writes_files() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let report = init
            .init(&package(dir.path()), &[], InitOptions::default())
            .unwrap();
        assert!(!report.written.is_empty());
        assert!(report.overwritten.is_empty());

        let conf = fs::read_to_string(dir.path().join("docs/source/conf.py")).unwrap();
        assert!(conf.contains("project = \"haive-core\""));
        assert!(dir.path().join("docs/source/_static").is_dir());
    }

    #[test]
    fn test_init_twice_refuses_without_force() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();
        let pkg = package(dir.path());

        init.init(&pkg, &[], InitOptions::default()).unwrap();
        let conf_path = dir.path().join("docs/source/conf.py");
        fs::write(&conf_path, "# hand edited\n").unwrap();

        let err = init.init(&pkg, &[], InitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized(_)));
        assert_eq!(fs::read_to_string(&conf_path).unwrap(), "# hand edited\n");
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();
        let pkg = package(dir.path());

        init.init(&pkg, &[], InitOptions::default()).unwrap();
        let report = init
            .init(&pkg, &[], InitOptions { force: true, dry_run: false })
            .unwrap();
        assert_eq!(report.overwritten.len(), report.written.len());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let report = init
            .init(&package(dir.path()), &[], InitOptions { force: false, dry_run: true })
            .unwrap();
        assert!(report.dry_run);
        assert!(!report.written.is_empty());
        assert!(!dir.path().join("docs").exists());
        assert!(report.summary().starts_with("Would write"));
    }

    #[test]
    fn test_sibling_intersphinx() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let mgr = manager();
        let init = DocsInitializer::new(&config, &mgr).unwrap();

        let core = package(&dir.path().join("packages/core"));
        let mut agents = package(&dir.path().join("packages/agents"));
        agents.metadata.name = "haive-agents".to_string();

        let plan = init.plan(&agents, &[&core]).unwrap();
        let conf = &plan.files[0];
        // Links resolve from build/html; the inventory from the source dir.
        assert!(conf.contents.contains(
            "\"haive-core\": (\"../../../../core/docs/build/html\", \"../../../core/docs/build/html/objects.inv\"),"
        ));
    }

    #[test]
    fn test_ensure_writable_empty_dir_ok() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        assert!(ensure_writable(&docs, false).is_ok());
    }
}
