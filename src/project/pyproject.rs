// pyproject.toml metadata extraction
//
// Reads PEP 621 `[project]` tables and falls back to `[tool.poetry]`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Package metadata relevant to documentation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Distribution name as written in pyproject.toml
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    /// Runtime dependencies, as normalized distribution names
    pub dependencies: Vec<String>,
    /// Requirement lines declared for building docs (`docs` extra or group)
    pub docs_requirements: Vec<String>,
    pub requires_python: Option<String>,
}

impl PackageMetadata {
    /// Normalized distribution name
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Name as it would be imported from Python
    pub fn import_name(&self) -> String {
        self.normalized_name().replace('-', "_")
    }

    /// Authors joined for display, or a placeholder
    pub fn author_line(&self) -> String {
        if self.authors.is_empty() {
            "Unknown".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPyproject {
    project: Option<RawProject>,
    tool: Option<RawTool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: BTreeMap<String, Vec<String>>,
    #[serde(rename = "requires-python")]
    requires_python: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuthor {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTool {
    poetry: Option<RawPoetry>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPoetry {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    #[serde(default)]
    group: BTreeMap<String, RawPoetryGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPoetryGroup {
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

/// Normalize a distribution name (PEP 503)
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep && !out.is_empty() {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_sep = false;
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

/// Extract the distribution name from a PEP 508 requirement string.
///
/// `"haive-core[extras]>=0.1; python_version>'3.9'"` gives `haive-core`.
pub fn requirement_name(spec: &str) -> Option<String> {
    let trimmed = spec.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }
    let end = trimmed
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(trimmed.len());
    let name = &trimmed[..end];
    if name.is_empty() {
        None
    } else {
        Some(normalize_name(name))
    }
}

/// Read and parse a pyproject.toml file
pub fn read_pyproject(path: &Path) -> Result<PackageMetadata> {
    let text = std::fs::read_to_string(path)?;
    parse_pyproject(&text, path)
}

/// Parse pyproject.toml text; `path` is only used for error messages
pub fn parse_pyproject(text: &str, path: &Path) -> Result<PackageMetadata> {
    let raw: RawPyproject =
        toml::from_str(text).map_err(|e| Error::pyproject(path, e.message().to_string()))?;

    let project = raw.project.unwrap_or_default();
    let poetry = raw.tool.and_then(|t| t.poetry).unwrap_or_default();

    let name = project
        .name
        .or(poetry.name)
        .ok_or_else(|| Error::pyproject(path, "no [project] or [tool.poetry] name"))?;

    let mut authors: Vec<String> = project
        .authors
        .into_iter()
        .filter_map(|a| a.name.or(a.email))
        .collect();
    if authors.is_empty() {
        authors = poetry
            .authors
            .iter()
            .map(|a| a.split('<').next().unwrap_or(a).trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
    }

    let mut dependencies: Vec<String> = project
        .dependencies
        .iter()
        .filter_map(|d| requirement_name(d))
        .collect();
    dependencies.extend(
        poetry
            .dependencies
            .keys()
            .filter(|k| k.as_str() != "python")
            .map(|k| normalize_name(k)),
    );
    dedup_in_place(&mut dependencies);

    let mut docs_requirements: Vec<String> = project
        .optional_dependencies
        .get("docs")
        .cloned()
        .unwrap_or_default();
    if let Some(group) = poetry.group.get("docs") {
        docs_requirements.extend(group.dependencies.keys().cloned());
    }
    dedup_in_place(&mut docs_requirements);

    Ok(PackageMetadata {
        name,
        version: project.version.or(poetry.version),
        description: project.description.or(poetry.description),
        authors,
        dependencies,
        docs_requirements,
        requires_python: project.requires_python,
    })
}

fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|d| seen.insert(d.clone()));
}
