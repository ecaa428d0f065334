// Assembling the values that go into a package's conf.py

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extensions::{merge_settings, ExtensionPlan};
use crate::project::PythonPackage;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Default intersphinx target for the standard library
pub const PYTHON_DOCS_URL: &str = "https://docs.python.org/3";

const INTERSPHINX: &str = "sphinx.ext.intersphinx";
const AUTOAPI: &str = "autoapi.extension";

/// Where intersphinx finds another project's docs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntersphinxTarget {
    /// Base of the links, relative to the built HTML or absolute
    pub url: String,
    /// `objects.inv` location when it cannot be derived from `url`.
    /// Sphinx resolves local paths here against the source directory.
    pub inventory: Option<String>,
}

impl IntersphinxTarget {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inventory: None,
        }
    }

    pub fn local(url: impl Into<String>, inventory: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inventory: Some(inventory.into()),
        }
    }
}

/// Everything needed to render conf.py
#[derive(Debug, Clone, Serialize)]
pub struct SphinxConfig {
    pub project: String,
    pub author: String,
    pub copyright: String,
    pub version: String,
    pub release: String,
    pub extensions: Vec<String>,
    pub html_theme: String,
    pub html_theme_options: Map<String, Value>,
    pub intersphinx_mapping: BTreeMap<String, IntersphinxTarget>,
    pub autoapi_dirs: Vec<String>,
    /// Paths inserted into `sys.path` so autodoc can import the package
    pub sys_path: Vec<String>,
    pub templates_path: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub html_static_path: Vec<String>,
    pub html_title: String,
    /// Extension settings merged with user settings, minus the keys
    /// lifted into the fields above
    pub settings: Map<String, Value>,
}

/// Builds a [`SphinxConfig`] for one package
pub struct SphinxConfigBuilder<'a> {
    package: &'a PythonPackage,
    config: &'a Config,
    plan: Option<&'a ExtensionPlan>,
    intersphinx: BTreeMap<String, IntersphinxTarget>,
}

impl<'a> SphinxConfigBuilder<'a> {
    pub fn new(package: &'a PythonPackage, config: &'a Config) -> Self {
        Self {
            package,
            config,
            plan: None,
            intersphinx: BTreeMap::new(),
        }
    }

    pub fn with_plan(mut self, plan: &'a ExtensionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Add an intersphinx target, e.g. a sibling package's built docs
    pub fn with_intersphinx(mut self, name: impl Into<String>, target: IntersphinxTarget) -> Self {
        self.intersphinx.insert(name.into(), target);
        self
    }

    pub fn build(self) -> SphinxConfig {
        let meta = &self.package.metadata;
        let project_cfg = &self.config.project;
        let docs = &self.config.docs;

        let project = project_cfg.name.clone().unwrap_or_else(|| meta.name.clone());
        let author = project_cfg.author.clone().unwrap_or_else(|| meta.author_line());
        let copyright = project_cfg
            .copyright
            .clone()
            .unwrap_or_else(|| format!("%Y, {}", author));
        let release = project_cfg
            .version
            .clone()
            .or_else(|| meta.version.clone())
            .unwrap_or_else(|| "0.1.0".to_string());
        let version = short_version(&release);

        let extensions = self.plan.map(|p| p.order.clone()).unwrap_or_default();
        let enabled = |name: &str| extensions.iter().any(|e| e == name);

        let mut settings = self.plan.map(|p| p.config.clone()).unwrap_or_default();
        merge_settings(&mut settings, &docs.settings);

        let mut html_theme_options = docs.theme.default_options();
        if let Some(Value::Object(user)) = settings.remove("html_theme_options") {
            merge_settings(&mut html_theme_options, &user);
        }

        // User settings for these keys win over the generated defaults.
        let html_theme = take_string(&mut settings, "html_theme")
            .unwrap_or_else(|| docs.theme.html_theme().to_string());
        let html_title = take_string(&mut settings, "html_title").unwrap_or_else(|| project.clone());
        let templates_path = take_strings(&mut settings, "templates_path")
            .unwrap_or_else(|| vec!["_templates".to_string()]);
        let html_static_path = take_strings(&mut settings, "html_static_path")
            .unwrap_or_else(|| vec!["_static".to_string()]);
        let exclude_patterns = take_strings(&mut settings, "exclude_patterns").unwrap_or_else(|| {
            vec![
                "_build".to_string(),
                "Thumbs.db".to_string(),
                ".DS_Store".to_string(),
            ]
        });

        let mut intersphinx_mapping = BTreeMap::new();
        if enabled(INTERSPHINX) {
            intersphinx_mapping.insert(
                "python".to_string(),
                IntersphinxTarget::remote(PYTHON_DOCS_URL),
            );
            for (name, url) in &docs.intersphinx {
                intersphinx_mapping.insert(name.clone(), IntersphinxTarget::remote(url.clone()));
            }
            intersphinx_mapping.extend(self.intersphinx);
        }

        let up = up_from_source(&docs.dir.join(&docs.source_dir));
        let autoapi_dirs = if enabled(AUTOAPI) {
            self.package
                .source_dirs
                .iter()
                .map(|d| format!("{}{}", up, slash_path(d)))
                .collect()
        } else {
            Vec::new()
        };

        let mut sys_path: Vec<String> = Vec::new();
        for dir in &self.package.source_dirs {
            let parent = dir.parent().map(slash_path).unwrap_or_default();
            let entry = if parent.is_empty() {
                up.trim_end_matches('/').to_string()
            } else {
                format!("{}{}", up, parent)
            };
            if !sys_path.contains(&entry) {
                sys_path.push(entry);
            }
        }

        SphinxConfig {
            project,
            author,
            copyright,
            version,
            release,
            extensions,
            html_theme,
            html_theme_options,
            intersphinx_mapping,
            autoapi_dirs,
            sys_path,
            templates_path,
            exclude_patterns,
            html_static_path,
            html_title,
            settings,
        }
    }
}

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Reject setting names that cannot be assigned to in conf.py
pub fn check_setting_names<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")?;
    for name in names {
        if !identifier.is_match(name) || PYTHON_KEYWORDS.contains(&name.as_str()) {
            return Err(Error::config_validation(format!(
                "setting {:?} is not a valid Python identifier",
                name
            )));
        }
    }
    Ok(())
}

/// Remove `key` from `settings` when it holds a string
fn take_string(settings: &mut Map<String, Value>, key: &str) -> Option<String> {
    match settings.get(key) {
        Some(Value::String(_)) => match settings.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Remove `key` from `settings` when it holds a list of strings
fn take_strings(settings: &mut Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = match settings.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    settings.remove(key);
    Some(items)
}

/// `1.2.3rc1` gives `1.2`
fn short_version(release: &str) -> String {
    let parts: Vec<&str> = release.split('.').take(2).collect();
    parts.join(".")
}

/// `../` repeated once per component of `source`
fn up_from_source(source: &Path) -> String {
    let depth = source
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    "../".repeat(depth)
}

/// Forward-slash rendering of a relative path, for use inside conf.py
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{AssumeAvailable, ExtensionCatalog, ExtensionManager, ExtensionRequest};
    use crate::project::{Layout, PackageMetadata};
    use crate::sphinx::Theme;
    use serde_json::json;
    use std::path::PathBuf;

    fn package() -> PythonPackage {
        PythonPackage {
            metadata: PackageMetadata {
                name: "haive-core".to_string(),
                version: Some("1.4.2".to_string()),
                authors: vec!["Ada".to_string()],
                ..Default::default()
            },
            root: PathBuf::from("/repo/packages/core"),
            layout: Layout::Src,
            source_dirs: vec![PathBuf::from("src/haive_core")],
            module_count: 3,
            internal_deps: Vec::new(),
        }
    }

    fn standard_plan() -> ExtensionPlan {
        ExtensionManager::new(ExtensionCatalog::builtin().unwrap(), Box::new(AssumeAvailable))
            .plan(&ExtensionRequest::default())
    }

    #[test]
    fn test_metadata_from_package() {
        let pkg = package();
        let config = Config::default();
        let conf = SphinxConfigBuilder::new(&pkg, &config).build();

        assert_eq!(conf.project, "haive-core");
        assert_eq!(conf.author, "Ada");
        assert_eq!(conf.copyright, "%Y, Ada");
        assert_eq!(conf.release, "1.4.2");
        assert_eq!(conf.version, "1.4");
        assert_eq!(conf.html_theme, "furo");
        assert!(conf.extensions.is_empty());
        assert!(conf.intersphinx_mapping.is_empty());
    }

    #[test]
    fn test_project_overrides() {
        let pkg = package();
        let mut config = Config::default();
        config.project.name = Some("Haive Core".to_string());
        config.project.version = Some("2.0".to_string());
        let conf = SphinxConfigBuilder::new(&pkg, &config).build();
        assert_eq!(conf.project, "Haive Core");
        assert_eq!(conf.release, "2.0");
    }

    #[test]
    fn test_plan_drives_autoapi_and_intersphinx() {
        let pkg = package();
        let config = Config::default();
        let plan = standard_plan();
        let conf = SphinxConfigBuilder::new(&pkg, &config)
            .with_plan(&plan)
            .with_intersphinx(
                "haive-agents",
                IntersphinxTarget::local(
                    "../../agents/docs/build/html",
                    "../../agents/docs/build/html/objects.inv",
                ),
            )
            .build();

        assert_eq!(conf.autoapi_dirs, vec!["../../src/haive_core".to_string()]);
        assert_eq!(conf.sys_path, vec!["../../src".to_string()]);
        assert_eq!(
            conf.intersphinx_mapping.get("python"),
            Some(&IntersphinxTarget::remote(PYTHON_DOCS_URL))
        );
        assert_eq!(
            conf.intersphinx_mapping["haive-agents"].inventory.as_deref(),
            Some("../../agents/docs/build/html/objects.inv")
        );
        assert_eq!(conf.settings["autoapi_type"], "python");
    }

    #[test]
    fn test_flat_layout_sys_path() {
        let mut pkg = package();
        pkg.source_dirs = vec![PathBuf::from("haive_core")];
        let config = Config::default();
        let plan = standard_plan();
        let conf = SphinxConfigBuilder::new(&pkg, &config).with_plan(&plan).build();
        assert_eq!(conf.sys_path, vec!["../..".to_string()]);
        assert_eq!(conf.autoapi_dirs, vec!["../../haive_core".to_string()]);
    }

    #[test]
    fn test_user_settings_override_extension_settings() {
        let pkg = package();
        let mut config = Config::default();
        config.docs.theme = Theme::ReadTheDocs;
        config
            .docs
            .settings
            .insert("autoapi_keep_files".to_string(), json!(true));
        config.docs.settings.insert(
            "html_theme_options".to_string(),
            json!({"navigation_depth": 2}),
        );
        let plan = standard_plan();
        let conf = SphinxConfigBuilder::new(&pkg, &config).with_plan(&plan).build();

        assert_eq!(conf.settings["autoapi_keep_files"], json!(true));
        assert!(!conf.settings.contains_key("html_theme_options"));
        assert_eq!(conf.html_theme_options["navigation_depth"], json!(2));
        assert_eq!(conf.html_theme_options["collapse_navigation"], json!(false));
    }

    #[test]
    fn test_user_settings_replace_html_defaults() {
        let pkg = package();
        let mut config = Config::default();
        config.docs.settings.insert("html_title".to_string(), json!("Custom Title"));
        config.docs.settings.insert("html_static_path".to_string(), json!(["assets"]));
        config.docs.settings.insert("exclude_patterns".to_string(), json!(["drafts/*"]));
        // Not a list of strings, so it stays a plain setting.
        config.docs.settings.insert("templates_path".to_string(), json!("tpl"));
        let conf = SphinxConfigBuilder::new(&pkg, &config).build();

        assert_eq!(conf.html_title, "Custom Title");
        assert_eq!(conf.html_static_path, vec!["assets".to_string()]);
        assert_eq!(conf.exclude_patterns, vec!["drafts/*".to_string()]);
        assert_eq!(conf.templates_path, vec!["_templates".to_string()]);
        assert_eq!(conf.settings["templates_path"], json!("tpl"));
        assert!(!conf.settings.contains_key("html_title"));
        assert!(!conf.settings.contains_key("html_static_path"));
    }

    #[test]
    fn test_html_title_defaults_to_project() {
        let pkg = package();
        let config = Config::default();
        let conf = SphinxConfigBuilder::new(&pkg, &config).build();
        assert_eq!(conf.html_title, "haive-core");
    }

    #[test]
    fn test_check_setting_names() {
        let ok = ["autoapi_type".to_string(), "_private".to_string(), "html_logo2".to_string()];
        assert!(check_setting_names(&ok).is_ok());

        for bad in ["my-option", "a b", "2fast", "", "class"] {
            let names = [bad.to_string()];
            assert!(
                matches!(check_setting_names(&names), Err(Error::ConfigValidation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_short_version() {
        assert_eq!(short_version("1.2.3rc1"), "1.2");
        assert_eq!(short_version("3"), "3");
    }

    #[test]
    fn test_up_from_source() {
        assert_eq!(up_from_source(Path::new("docs/source")), "../../");
        assert_eq!(up_from_source(Path::new("docs")), "../");
    }
}
