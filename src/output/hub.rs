// Monorepo hub: one docs site linking every package's built docs

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extensions::{ExtensionManager, ExtensionRequest};
use crate::output::relative_path;
use crate::output::scaffold::{ensure_writable, write_plan, InitOptions, InitReport, ScaffoldFile, ScaffoldPlan};
use crate::output::templates::{HubEntry, TemplateEngine};
use crate::project::{PackageMetadata, Project, PythonPackage};
use crate::sphinx::{IntersphinxTarget, SphinxConfigBuilder};
use tracing::info;

const INTERSPHINX: &str = "sphinx.ext.intersphinx";

/// Generates the hub docs source for a monorepo
pub struct HubBuilder<'a> {
    config: &'a Config,
    manager: &'a ExtensionManager,
    engine: TemplateEngine,
}

impl<'a> HubBuilder<'a> {
    pub fn new(config: &'a Config, manager: &'a ExtensionManager) -> Result<Self> {
        Ok(Self {
            config,
            manager,
            engine: TemplateEngine::new()?,
        })
    }

    pub fn plan(&self, project: &Project) -> Result<ScaffoldPlan> {
        if !project.is_monorepo() {
            return Err(Error::other(
                "link-docs needs a monorepo; use `build` for a single package",
            ));
        }

        let docs = &self.config.docs;
        let hub_root = project.root.join(&self.config.monorepo.hub_dir);
        let source = hub_root.join(&docs.source_dir);
        let html = hub_root.join(&docs.build_dir).join("html");

        // The hub itself has no API; it only needs cross-references.
        let extensions = self.manager.plan(&ExtensionRequest {
            explicit: Some(vec![INTERSPHINX.to_string()]),
            ..Default::default()
        });

        let hub_package = PythonPackage {
            metadata: project.root_metadata.clone().unwrap_or_else(|| PackageMetadata {
                name: project.display_name(),
                ..Default::default()
            }),
            root: project.root.clone(),
            layout: Default::default(),
            source_dirs: Vec::new(),
            module_count: 0,
            internal_deps: Vec::new(),
        };

        let mut builder = SphinxConfigBuilder::new(&hub_package, self.config).with_plan(&extensions);
        let mut entries = Vec::with_capacity(project.packages.len());
        for package in &project.packages {
            let target = docs.build_path(&package.root).join("html");
            let link = relative_path(&html, &target);
            let inventory = format!("{}/objects.inv", relative_path(&source, &target));
            builder = builder.with_intersphinx(
                package.name(),
                IntersphinxTarget::local(link.clone(), inventory),
            );
            entries.push(HubEntry {
                name: package.name().to_string(),
                version: package
                    .metadata
                    .version
                    .clone()
                    .unwrap_or_else(|| "unversioned".to_string()),
                description: package.metadata.description.clone(),
                link: format!("{}/index.html", link),
            });
        }
        let conf = builder.build();

        let files = vec![
            ScaffoldFile {
                path: source.join("conf.py"),
                contents: self.engine.render_conf_py(&conf)?,
            },
            ScaffoldFile {
                path: source.join("index.rst"),
                contents: self.engine.render_hub_index(&conf.project, &entries)?,
            },
            ScaffoldFile {
                path: source.join("_static").join(".gitkeep"),
                contents: String::new(),
            },
            ScaffoldFile {
                path: hub_root.join("Makefile"),
                contents: self.engine.render_makefile(self.config)?,
            },
            ScaffoldFile {
                path: hub_root.join(".gitignore"),
                contents: self.engine.render_gitignore(self.config)?,
            },
        ];

        Ok(ScaffoldPlan {
            docs_dir: hub_root,
            files,
            extensions,
        })
    }

    /// Write the hub, refusing a non-empty hub directory unless forced
    pub fn generate(&self, project: &Project, options: InitOptions) -> Result<InitReport> {
        let hub_root = project.root.join(&self.config.monorepo.hub_dir);
        ensure_writable(&hub_root, options.force)?;

        let plan = self.plan(project)?;
        let report = write_plan(&plan, options.dry_run)?;
        info!(packages = project.packages.len(), dry_run = options.dry_run, "hub generated");
        Ok(report)
    }
}
