use crate::error::{Error, Result};
use crate::extensions::Profile;
use crate::sphinx::{check_setting_names, Theme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the project root when no `--config` is given
pub const CONFIG_FILE_NAME: &str = "pydevelop-docs.toml";

/// Table name inside `pyproject.toml` that may hold the same settings
pub const PYPROJECT_TOOL_TABLE: &str = "pydevelop-docs";

/// Environment variable selecting the HTML theme
pub const ENV_THEME: &str = "SPHINX_THEME";
/// Environment variable selecting the extension profile
pub const ENV_PROFILE: &str = "SPHINX_EXTENSION_PROFILE";
/// Environment variable holding an explicit, comma separated extension set
pub const ENV_EXTENSION_SET: &str = "SPHINX_EXTENSION_SET";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub docs: DocsConfig,
    pub build: BuildConfig,
    pub monorepo: MonorepoConfig,
}

/// Project metadata overrides. Anything left unset comes from `pyproject.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub copyright: Option<String>,
}

/// Docs layout and Sphinx configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Docs directory relative to a package root
    pub dir: PathBuf,
    /// Sphinx source directory relative to `dir`
    pub source_dir: PathBuf,
    /// Build output directory relative to `dir`
    pub build_dir: PathBuf,
    pub theme: Theme,
    pub profile: Profile,
    /// Extensions requested on top of the profile
    pub extensions: Vec<String>,
    /// Extensions removed from the request
    pub disable: Vec<String>,
    /// Replaces the profile's extension list entirely when set
    pub extension_set: Option<Vec<String>>,
    /// Additional intersphinx targets (name -> base url)
    pub intersphinx: BTreeMap<String, String>,
    /// Raw `conf.py` settings applied after everything else
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Build orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub builder: String,
    pub workers: usize,
    pub timeout_secs: u64,
    pub warnings_as_errors: bool,
    pub keep_going: bool,
    pub quiet: bool,
    /// Value passed to `sphinx-build -j`; `None` disables Sphinx's own parallelism
    pub jobs: Option<String>,
    pub sphinx_build: String,
    pub python: String,
}

/// Monorepo discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonorepoConfig {
    /// Glob patterns (relative to the repo root) matching package directories
    pub packages: Vec<String>,
    /// Package names to leave out of discovery
    pub exclude: Vec<String>,
    /// Where the hub docs linking every package live, relative to the root
    pub hub_dir: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("docs"),
            source_dir: PathBuf::from("source"),
            build_dir: PathBuf::from("build"),
            theme: Theme::default(),
            profile: Profile::default(),
            extensions: Vec::new(),
            disable: Vec::new(),
            extension_set: None,
            intersphinx: BTreeMap::new(),
            settings: serde_json::Map::new(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            builder: "html".to_string(),
            workers: 4,
            timeout_secs: 600,
            warnings_as_errors: false,
            keep_going: true,
            quiet: true,
            jobs: Some("auto".to_string()),
            sphinx_build: "sphinx-build".to_string(),
            python: "python3".to_string(),
        }
    }
}

impl Default for MonorepoConfig {
    fn default() -> Self {
        Self {
            packages: vec!["packages/*".to_string()],
            exclude: Vec::new(),
            hub_dir: PathBuf::from("docs"),
        }
    }
}

/// Overrides collected from command-line flags
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub builder: Option<String>,
    pub warnings_as_errors: bool,
    pub theme: Option<String>,
    pub profile: Option<String>,
}

impl DocsConfig {
    /// Sphinx source directory for a package rooted at `package_root`
    pub fn source_path(&self, package_root: &Path) -> PathBuf {
        package_root.join(&self.dir).join(&self.source_dir)
    }

    /// Build output directory for a package rooted at `package_root`
    pub fn build_path(&self, package_root: &Path) -> PathBuf {
        package_root.join(&self.dir).join(&self.build_dir)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the `[tool.pydevelop-docs]` table from a `pyproject.toml`.
    /// Returns `None` when the file has no such table.
    pub fn from_pyproject(path: &Path) -> Result<Option<Self>> {
        let contents = std::fs::read_to_string(path)?;
        let doc: toml::Table = toml::from_str(&contents)?;
        let table = doc
            .get("tool")
            .and_then(|t| t.get(PYPROJECT_TOOL_TABLE))
            .cloned();

        match table {
            Some(value) => {
                let config: Config = value.try_into()?;
                config.validate()?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    /// Resolve configuration for a project root.
    ///
    /// An explicit path must exist. Otherwise `pydevelop-docs.toml` is tried,
    /// then `[tool.pydevelop-docs]` in `pyproject.toml`, then defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
            debug!(path = %path.display(), "loading explicit config");
            return Self::load(path);
        }

        let dedicated = root.join(CONFIG_FILE_NAME);
        if dedicated.is_file() {
            debug!(path = %dedicated.display(), "loading config file");
            return Self::load(&dedicated);
        }

        let pyproject = root.join("pyproject.toml");
        if pyproject.is_file() {
            if let Some(config) = Self::from_pyproject(&pyproject)? {
                debug!(path = %pyproject.display(), "loading config from pyproject.toml");
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// Apply `SPHINX_*` environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using a custom variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(theme) = lookup(ENV_THEME).filter(|v| !v.trim().is_empty()) {
            self.docs.theme = theme.trim().parse()?;
        }

        if let Some(profile) = lookup(ENV_PROFILE).filter(|v| !v.trim().is_empty()) {
            self.docs.profile = profile.trim().parse()?;
        }

        if let Some(set) = lookup(ENV_EXTENSION_SET).filter(|v| !v.trim().is_empty()) {
            let names: Vec<String> = set
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.docs.extension_set = Some(names);
        }

        self.validate()
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(&mut self, overrides: CliOverrides) -> Result<()> {
        if let Some(workers) = overrides.workers {
            self.build.workers = workers;
        }

        if let Some(timeout) = overrides.timeout_secs {
            self.build.timeout_secs = timeout;
        }

        if let Some(builder) = overrides.builder {
            self.build.builder = builder;
        }

        if overrides.warnings_as_errors {
            self.build.warnings_as_errors = true;
        }

        if let Some(theme) = overrides.theme {
            self.docs.theme = theme.parse()?;
        }

        if let Some(profile) = overrides.profile {
            self.docs.profile = profile.parse()?;
        }

        self.validate()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.build.workers == 0 {
            return Err(Error::config_validation("workers must be at least 1"));
        }

        if self.build.workers > 64 {
            return Err(Error::config_validation("workers cannot exceed 64"));
        }

        if self.build.timeout_secs == 0 {
            return Err(Error::config_validation("timeout_secs must be at least 1"));
        }

        if self.build.builder.trim().is_empty() {
            return Err(Error::config_validation("builder cannot be empty"));
        }

        if self.docs.dir.as_os_str().is_empty() {
            return Err(Error::config_validation("docs dir cannot be empty"));
        }

        if self.monorepo.packages.is_empty() {
            return Err(Error::config_validation(
                "at least one monorepo package pattern required",
            ));
        }

        check_setting_names(self.docs.settings.keys())?;

        Ok(())
    }
}
