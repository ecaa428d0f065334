// Static catalogue of known Sphinx extensions
//
// The table lives in catalog/extensions.toml and is embedded at compile time.

use crate::error::{Error, Result};
use crate::sphinx::check_setting_names;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/extensions.toml");

/// Functional grouping of an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Api,
    Markdown,
    Content,
    Ui,
    Diagrams,
    Seo,
    Quality,
    Integration,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Core,
        Category::Api,
        Category::Markdown,
        Category::Content,
        Category::Ui,
        Category::Diagrams,
        Category::Seo,
        Category::Quality,
        Category::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Api => "api",
            Category::Markdown => "markdown",
            Category::Content => "content",
            Category::Ui => "ui",
            Category::Diagrams => "diagrams",
            Category::Seo => "seo",
            Category::Quality => "quality",
            Category::Integration => "integration",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config_validation(format!("unknown extension category: {}", s)))
    }
}

/// Predefined extension selections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Minimal,
    #[default]
    Standard,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Minimal => "minimal",
            Profile::Standard => "standard",
            Profile::Full => "full",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" | "basic" => Ok(Profile::Minimal),
            "standard" | "default" => Ok(Profile::Standard),
            "full" | "comprehensive" => Ok(Profile::Full),
            other => Err(Error::config_validation(format!(
                "unknown extension profile: {}",
                other
            ))),
        }
    }
}

/// A catalogue entry describing one Sphinx extension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionSpec {
    /// Import path listed in `conf.py` `extensions`
    pub name: String,
    /// pip distribution providing the extension
    pub package: String,
    /// Lower values load earlier
    pub priority: i32,
    pub category: Category,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// `conf.py` settings contributed by the extension
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl ExtensionSpec {
    /// Check whether this extension declares a conflict with `other`
    pub fn conflicts_with(&self, other: &str) -> bool {
        self.conflicts.iter().any(|c| c == other)
    }

    /// Sort key used to break ordering ties
    pub fn sort_key(&self) -> (i32, &str) {
        (self.priority, self.name.as_str())
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    extension: Vec<ExtensionSpec>,
}

/// Lookup table of extension specs, in catalogue order
#[derive(Debug, Clone)]
pub struct ExtensionCatalog {
    specs: Vec<ExtensionSpec>,
    index: HashMap<String, usize>,
}

impl ExtensionCatalog {
    /// Load the catalogue shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Parse a catalogue from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::from_specs(file.extension)
    }

    /// Build a catalogue, checking names are unique and references resolve
    pub fn from_specs(specs: Vec<ExtensionSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::catalog(format!("duplicate extension: {}", spec.name)));
            }
        }

        for spec in &specs {
            check_setting_names(spec.config.keys())?;
            for name in spec.requires.iter().chain(spec.conflicts.iter()) {
                if !index.contains_key(name) {
                    return Err(Error::catalog(format!(
                        "{} references unknown extension {}",
                        spec.name, name
                    )));
                }
            }
        }

        Ok(Self { specs, index })
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionSpec> {
        self.specs.iter()
    }

    /// Extension names requested by a profile, in catalogue order
    pub fn profile(&self, profile: Profile) -> Vec<String> {
        self.specs
            .iter()
            .filter(|s| s.profiles.contains(&profile))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Distinct pip packages providing the given extensions, sorted
    pub fn packages_for<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let set: HashSet<&str> = names
            .into_iter()
            .filter_map(|n| self.get(n))
            .map(|s| s.package.as_str())
            .collect();
        let mut packages: Vec<String> = set.into_iter().map(str::to_string).collect();
        packages.sort();
        packages
    }
}
