// Integration tests for pydevelop-docs library workflows

use pydevelop_docs::build::{
    BuildOptions, BuildStatus, CommandOutput, CommandRunner, CommandSpec, MonorepoDocsBuilder,
    PackageConfig, SphinxBuilder,
};
use pydevelop_docs::extensions::AssumeAvailable;
use pydevelop_docs::output::{DocsInitializer, HubBuilder, InitOptions};
use pydevelop_docs::project::{Layout, ProjectKind};
use pydevelop_docs::{Config, ExtensionCatalog, ExtensionManager, ProjectAnalyzer, Result};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn add_package(root: &Path, dir: &str, name: &str, deps: &[&str]) {
    let deps: Vec<String> = deps.iter().map(|d| format!("\"{}>=0.1\"", d)).collect();
    write(
        &root.join(dir).join("pyproject.toml"),
        &format!(
            "[project]\nname = \"{}\"\nversion = \"0.2.0\"\ndescription = \"The {} package\"\ndependencies = [{}]\n",
            name,
            name,
            deps.join(", ")
        ),
    );
    let import = name.replace('-', "_");
    write(&root.join(dir).join("src").join(&import).join("__init__.py"), "");
    write(&root.join(dir).join("src").join(&import).join("core.py"), "def f():\n    pass\n");
}

/// haive-core <- haive-tools <- haive-agents, plus an unrelated haive-games
fn monorepo() -> TempDir {
    let dir = TempDir::new().unwrap();
    add_package(dir.path(), "packages/core", "haive-core", &["pydantic"]);
    add_package(dir.path(), "packages/tools", "haive-tools", &["haive-core"]);
    add_package(dir.path(), "packages/agents", "haive-agents", &["haive-core", "haive-tools"]);
    add_package(dir.path(), "packages/games", "haive-games", &[]);
    dir
}

fn manager() -> ExtensionManager {
    ExtensionManager::new(ExtensionCatalog::builtin().unwrap(), Box::new(AssumeAvailable))
}

/// Records the order packages ran in; fails the named ones
struct RecordingRunner {
    failing: Vec<String>,
    order: Mutex<Vec<String>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec, _timeout: Option<Duration>) -> Result<CommandOutput> {
        let dir = spec
            .cwd
            .as_ref()
            .and_then(|d| d.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.order.lock().unwrap().push(dir.clone());
        let fail = self.failing.contains(&dir);
        Ok(CommandOutput {
            exit_code: Some(if fail { 1 } else { 0 }),
            stderr: if fail { "WARNING: boom\n".to_string() } else { String::new() },
            ..Default::default()
        })
    }
}

#[test]
fn test_monorepo_discovery() {
    let repo = monorepo();
    let project = ProjectAnalyzer::new(Config::default())
        .analyze(repo.path())
        .unwrap();

    assert_eq!(project.kind, ProjectKind::Monorepo);
    assert_eq!(project.packages.len(), 4);

    let agents = project.package("haive_agents").unwrap();
    assert_eq!(agents.layout, Layout::Src);
    assert_eq!(agents.module_count, 2);
    assert_eq!(
        agents.internal_deps,
        vec!["haive-core".to_string(), "haive-tools".to_string()]
    );
    assert!(project.package("haive-core").unwrap().internal_deps.is_empty());
}

#[test]
fn test_init_then_hub_for_monorepo() {
    let repo = monorepo();
    let config = Config::default();
    let project = ProjectAnalyzer::new(config.clone()).analyze(repo.path()).unwrap();
    let mgr = manager();
    let init = DocsInitializer::new(&config, &mgr).unwrap();

    for package in &project.packages {
        let siblings: Vec<_> = package
            .internal_deps
            .iter()
            .filter_map(|d| project.package(d))
            .collect();
        init.init(package, &siblings, InitOptions::default()).unwrap();
    }

    let agents_conf =
        fs::read_to_string(repo.path().join("packages/agents/docs/source/conf.py")).unwrap();
    assert!(agents_conf.contains("project = \"haive-agents\""));
    assert!(agents_conf.contains(
        "\"haive-core\": (\"../../../../core/docs/build/html\", \"../../../core/docs/build/html/objects.inv\"),"
    ));
    assert!(agents_conf.contains(
        "\"haive-tools\": (\"../../../../tools/docs/build/html\", \"../../../tools/docs/build/html/objects.inv\"),"
    ));
    assert!(agents_conf.contains("autoapi_dirs = [\"../../src/haive_agents\"]"));

    HubBuilder::new(&config, &mgr)
        .unwrap()
        .generate(&project, InitOptions::default())
        .unwrap();
    let hub_index = fs::read_to_string(repo.path().join("docs/source/index.rst")).unwrap();
    for name in ["haive-agents", "haive-core", "haive-games", "haive-tools"] {
        assert!(hub_index.contains(name), "{} missing from hub", name);
    }
}

#[test]
fn test_build_all_respects_dependency_order() {
    let repo = monorepo();
    let config = Config::default();
    let project = ProjectAnalyzer::new(config.clone()).analyze(repo.path()).unwrap();
    let mgr = manager();
    let init = DocsInitializer::new(&config, &mgr).unwrap();
    for package in &project.packages {
        init.init(package, &[], InitOptions::default()).unwrap();
    }

    let packages: Vec<PackageConfig> = project
        .packages
        .iter()
        .map(|p| PackageConfig::from_package(p, &config))
        .collect();
    let runner = Arc::new(RecordingRunner {
        failing: Vec::new(),
        order: Mutex::new(Vec::new()),
    });
    let builder = SphinxBuilder::new(runner.clone(), BuildOptions::from_config(&config));
    let summary = MonorepoDocsBuilder::new(builder, 2)
        .build_all(&packages)
        .unwrap();

    assert_eq!(summary.succeeded(), 4);
    let order = runner.order.lock().unwrap().clone();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("core") < pos("tools"));
    assert!(pos("tools") < pos("agents"));
}

#[test]
fn test_failed_core_blocks_dependents_only() {
    let repo = monorepo();
    let config = Config::default();
    let project = ProjectAnalyzer::new(config.clone()).analyze(repo.path()).unwrap();
    let mgr = manager();
    let init = DocsInitializer::new(&config, &mgr).unwrap();
    for package in &project.packages {
        init.init(package, &[], InitOptions::default()).unwrap();
    }

    let packages: Vec<PackageConfig> = project
        .packages
        .iter()
        .map(|p| PackageConfig::from_package(p, &config))
        .collect();
    let runner = Arc::new(RecordingRunner {
        failing: vec!["core".to_string()],
        order: Mutex::new(Vec::new()),
    });
    let builder = SphinxBuilder::new(runner.clone(), BuildOptions::from_config(&config));
    let summary = MonorepoDocsBuilder::new(builder, 4)
        .build_all(&packages)
        .unwrap();

    assert_eq!(summary.results.len(), 4);
    assert_eq!(
        summary.get("haive-core").unwrap().status,
        BuildStatus::Failed { exit_code: Some(1) }
    );
    assert_eq!(
        summary.get("haive-tools").unwrap().status,
        BuildStatus::Blocked { by: "haive-core".to_string() }
    );
    assert!(matches!(
        summary.get("haive-agents").unwrap().status,
        BuildStatus::Blocked { .. }
    ));
    assert_eq!(summary.get("haive-games").unwrap().status, BuildStatus::Success);
    assert_eq!(summary.exit_code(), 1);

    let order = runner.order.lock().unwrap().clone();
    assert!(!order.contains(&"tools".to_string()));
    assert!(!order.contains(&"agents".to_string()));
}

#[test]
fn test_pyproject_tool_table_configures_docs() {
    let dir = TempDir::new().unwrap();
    write(
        &dir.path().join("pyproject.toml"),
        "[project]\nname = \"solo\"\nversion = \"1.0.0\"\n\n\
         [tool.pydevelop-docs.docs]\ntheme = \"sphinx_rtd_theme\"\nprofile = \"minimal\"\n",
    );
    write(&dir.path().join("solo/__init__.py"), "");

    let config = Config::discover(dir.path(), None).unwrap();
    let project = ProjectAnalyzer::new(config.clone()).analyze(dir.path()).unwrap();
    assert_eq!(project.kind, ProjectKind::SinglePackage);
    assert_eq!(project.packages[0].layout, Layout::Flat);

    let mgr = manager();
    let init = DocsInitializer::new(&config, &mgr).unwrap();
    let plan = init.plan(&project.packages[0], &[]).unwrap();
    let conf = &plan.files[0].contents;
    assert!(conf.contains("html_theme = \"sphinx_rtd_theme\""));
    assert!(!conf.contains("autoapi.extension"));
    assert!(plan.files.iter().any(|f| f.path.ends_with("api.rst")));
}
