// Source layout detection
//
// Finds the importable top-level packages of a Python project, either under
// `src/` or directly in the project root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never treated as source packages
const SKIP_DIRS: &[&str] = &[
    "tests",
    "test",
    "docs",
    "doc",
    "examples",
    "build",
    "dist",
    "venv",
    ".venv",
    "env",
    "node_modules",
    "__pycache__",
    ".git",
    ".tox",
    ".nox",
    ".eggs",
    ".mypy_cache",
    ".pytest_cache",
];

/// Where a project keeps its importable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<root>/src/<package>/__init__.py`
    Src,
    /// `<root>/<package>/__init__.py`
    Flat,
    #[default]
    Unknown,
}

/// Result of probing a project's source tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLayout {
    pub layout: Layout,
    /// Package directories relative to the project root
    pub source_dirs: Vec<PathBuf>,
    /// Number of `.py` files under the source directories
    pub module_count: usize,
}

/// Detect the layout of the project at `root`.
///
/// `import_name` is moved to the front of `source_dirs` when present, and
/// `docs_dir` is never considered a source package.
pub fn detect_layout(root: &Path, import_name: &str, docs_dir: &Path) -> SourceLayout {
    let src = root.join("src");
    let mut layout = Layout::Unknown;
    let mut dirs = Vec::new();

    if src.is_dir() {
        dirs = package_dirs(&src, docs_dir)
            .into_iter()
            .map(|d| PathBuf::from("src").join(d))
            .collect();
        if !dirs.is_empty() {
            layout = Layout::Src;
        }
    }

    if dirs.is_empty() {
        dirs = package_dirs(root, docs_dir);
        if !dirs.is_empty() {
            layout = Layout::Flat;
        }
    }

    dirs.sort_by_key(|d| {
        let matches = d.file_name().map_or(false, |n| n == import_name);
        (!matches, d.clone())
    });

    let module_count = dirs.iter().map(|d| count_modules(&root.join(d))).sum();

    SourceLayout {
        layout,
        source_dirs: dirs,
        module_count,
    }
}

/// Immediate subdirectories of `parent` that contain an `__init__.py`
fn package_dirs(parent: &Path, docs_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(parent) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !is_skipped(name) && Path::new(name) != docs_dir && !name.ends_with(".egg-info")
        })
        .filter(|p| p.join("__init__.py").is_file())
        .filter_map(|p| p.file_name().map(PathBuf::from))
        .collect();
    dirs.sort();
    dirs
}

fn is_skipped(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name.starts_with('.')
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .map_or(true, |n| !is_skipped(n))
}

/// Count `.py` files under a directory, skipping caches and virtualenvs
pub fn count_modules(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(keep_entry)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "py"))
        .count()
}
