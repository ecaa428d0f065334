// Sphinx build log analysis

use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

/// Files listed in the "most affected" section
const TOP_FILES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    fn parse(label: &str) -> Self {
        match label {
            "WARNING" => Severity::Warning,
            "ERROR" => Severity::Error,
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingReference,
    Toctree,
    Autodoc,
    Duplicate,
    Docstring,
    Syntax,
    Extension,
    Other,
}

impl DiagnosticKind {
    pub fn hint(&self) -> &'static str {
        match self {
            DiagnosticKind::MissingReference => {
                "Check the target name, or add an intersphinx mapping for the package that defines it"
            }
            DiagnosticKind::Toctree => {
                "Add the document to a toctree, or mark it :orphan: if it is intentionally standalone"
            }
            DiagnosticKind::Autodoc => {
                "Make sure the package is importable from conf.py (sys.path, installed dependencies)"
            }
            DiagnosticKind::Duplicate => {
                "Document each object once, or add :no-index: to the extra occurrences"
            }
            DiagnosticKind::Docstring => {
                "Fix the reStructuredText in the docstring; blank lines around lists and blocks are a common cause"
            }
            DiagnosticKind::Syntax => "Fix the reStructuredText markup at the reported line",
            DiagnosticKind::Extension => {
                "Install the extension's package (see `pydevelop-docs deps --fix`) or remove it from the extension list"
            }
            DiagnosticKind::Other => "See the full message for details",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::MissingReference => "missing reference",
            DiagnosticKind::Toctree => "toctree",
            DiagnosticKind::Autodoc => "autodoc",
            DiagnosticKind::Duplicate => "duplicate",
            DiagnosticKind::Docstring => "docstring",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Extension => "extension",
            DiagnosticKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// One warning or error from a build log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: String,
    /// Sphinx warning category, e.g. `ref.class`
    pub category: Option<String>,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindHint {
    pub kind: DiagnosticKind,
    pub count: usize,
    pub hint: &'static str,
}

/// Aggregated view of a build log
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogReport {
    pub diagnostics: Vec<Diagnostic>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_kind: BTreeMap<DiagnosticKind, usize>,
    /// Files with the most diagnostics, most affected first
    pub top_files: Vec<(String, usize)>,
    pub hints: Vec<KindHint>,
}

impl LogReport {
    fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_kind = BTreeMap::new();
        let mut per_file: HashMap<&str, usize> = HashMap::new();

        for d in &diagnostics {
            *by_severity.entry(d.severity).or_insert(0) += 1;
            *by_kind.entry(d.kind).or_insert(0) += 1;
            if let Some(file) = &d.file {
                *per_file.entry(file.as_str()).or_insert(0) += 1;
            }
        }

        let mut top_files: Vec<(String, usize)> = per_file
            .into_iter()
            .map(|(f, n)| (f.to_string(), n))
            .collect();
        top_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_files.truncate(TOP_FILES);

        let mut hints: Vec<KindHint> = by_kind
            .iter()
            .map(|(&kind, &count)| KindHint {
                kind,
                count,
                hint: kind.hint(),
            })
            .collect();
        hints.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));

        Self {
            diagnostics,
            by_severity,
            by_kind,
            top_files,
            hints,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Errors including critical ones
    pub fn errors(&self) -> usize {
        self.count(Severity::Error) + self.count(Severity::Critical)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        if self.is_clean() {
            return "No warnings or errors found.\n".to_string();
        }

        let mut out = format!(
            "{} warnings, {} errors\n",
            self.warnings(),
            self.errors()
        );

        out.push_str("\nBy kind:\n");
        for hint in &self.hints {
            out.push_str(&format!("  {:<18} {:>5}\n", hint.kind.to_string(), hint.count));
        }

        if !self.top_files.is_empty() {
            out.push_str("\nMost affected files:\n");
            for (file, count) in &self.top_files {
                out.push_str(&format!("  {:>5}  {}\n", count, file));
            }
        }

        out.push_str("\nSuggestions:\n");
        for hint in &self.hints {
            out.push_str(&format!("  - {}: {}\n", hint.kind, hint.hint));
        }

        out.push_str("\nDiagnostics:\n");
        for d in &self.diagnostics {
            let location = match (&d.file, d.line) {
                (Some(f), Some(l)) => format!("{}:{}", f, l),
                (Some(f), None) => f.clone(),
                _ => "-".to_string(),
            };
            out.push_str(&format!("  [{}] {} {}\n", d.severity, location, d.message));
        }
        out
    }
}

/// Parses Sphinx output into diagnostics
pub struct LogAnalyzer {
    ansi: Regex,
    located: Regex,
    bare: Regex,
    category: Regex,
    trailing_line: Regex,
}

impl LogAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ansi: Regex::new(r"\x1b\[[0-9;]*m")?,
            located: Regex::new(
                r"^(?P<loc>\S.*?): (?P<sev>WARNING|ERROR|CRITICAL|SEVERE): (?P<msg>.*)$",
            )?,
            bare: Regex::new(r"^(?P<sev>WARNING|ERROR|CRITICAL|SEVERE): (?P<msg>.*)$")?,
            category: Regex::new(r"\s*\[(?P<cat>[a-z][a-z0-9_.-]*)\]$")?,
            trailing_line: Regex::new(r":(?P<line>\d+)$")?,
        })
    }

    pub fn analyze_file(&self, path: &Path) -> Result<LogReport> {
        let bytes = fs::read(path)?;
        Ok(self.analyze(&String::from_utf8_lossy(&bytes)))
    }

    pub fn analyze(&self, text: &str) -> LogReport {
        let clean = self.ansi.replace_all(text, "");
        let lines: Vec<&str> = clean.lines().collect();
        let mut diagnostics = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim_end();

            if line.trim_start().starts_with("Exception occurred:") {
                let mut last = None;
                i += 1;
                while i < lines.len() && !lines[i].trim().is_empty() {
                    last = Some(lines[i].trim());
                    i += 1;
                }
                let message = last.unwrap_or("Exception occurred").to_string();
                diagnostics.push(Diagnostic {
                    kind: classify(&message, None, None),
                    severity: Severity::Critical,
                    file: None,
                    line: None,
                    message,
                    category: None,
                });
                continue;
            }

            if let Some(d) = self.parse_line(line) {
                diagnostics.push(d);
            }
            i += 1;
        }

        LogReport::from_diagnostics(diagnostics)
    }

    fn parse_line(&self, line: &str) -> Option<Diagnostic> {
        let (location, severity, message) = if let Some(caps) = self.bare.captures(line) {
            (None, caps.name("sev")?.as_str(), caps.name("msg")?.as_str())
        } else if let Some(caps) = self.located.captures(line) {
            (
                Some(caps.name("loc")?.as_str()),
                caps.name("sev")?.as_str(),
                caps.name("msg")?.as_str(),
            )
        } else {
            return None;
        };

        let (message, category) = match self.category.captures(message) {
            Some(caps) => {
                let start = caps.get(0)?.start();
                (message[..start].to_string(), caps.name("cat").map(|c| c.as_str().to_string()))
            }
            None => (message.to_string(), None),
        };

        let (file, line_no) = match location {
            Some(loc) => self.split_location(loc),
            None => (None, None),
        };

        Some(Diagnostic {
            kind: classify(&message, category.as_deref(), location),
            severity: Severity::parse(severity),
            file,
            line: line_no,
            message,
            category,
        })
    }

    /// `path:12`, `path:docstring of mod.func:3` or just `path`
    fn split_location(&self, loc: &str) -> (Option<String>, Option<u32>) {
        let (rest, line) = match self.trailing_line.captures(loc) {
            Some(caps) => {
                let start = caps.get(0).map_or(loc.len(), |m| m.start());
                (&loc[..start], caps["line"].parse().ok())
            }
            None => (loc, None),
        };
        let file = rest.split(":docstring of ").next().unwrap_or(rest);
        (Some(file.to_string()), line)
    }
}

fn classify(message: &str, category: Option<&str>, location: Option<&str>) -> DiagnosticKind {
    let msg = message.to_ascii_lowercase();
    let category = category.unwrap_or("");
    let in_docstring = location.map_or(false, |l| l.contains("docstring of"));
    let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    if has(&["could not import extension", "extension error", "extensionerror", "unknown extension"]) {
        DiagnosticKind::Extension
    } else if has(&["duplicate"]) {
        DiagnosticKind::Duplicate
    } else if category.starts_with("ref") || has(&["reference target not found", "undefined label", "unknown document"]) {
        DiagnosticKind::MissingReference
    } else if category.starts_with("toc") || has(&["toctree", "nonexisting document"]) {
        DiagnosticKind::Toctree
    } else if category.starts_with("autodoc")
        || category.starts_with("autoapi")
        || has(&["autodoc", "autoapi", "failed to import", "no module named"])
    {
        DiagnosticKind::Autodoc
    } else if in_docstring {
        DiagnosticKind::Docstring
    } else if has(&[
        "unknown directive",
        "unknown interpreted text role",
        "explicit markup ends",
        "title underline too short",
        "unexpected indentation",
        "block quote ends",
        "inline emphasis",
        "inline strong",
        "inline interpreted text",
        "malformed",
        "could not lex",
    ]) {
        DiagnosticKind::Syntax
    } else {
        DiagnosticKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
Running Sphinx v7.2.6
/repo/docs/source/index.rst:12: WARNING: undefined label: 'install'
/repo/src/pkg/core.py:docstring of pkg.core.Agent:5: WARNING: Unexpected indentation.
/repo/src/pkg/core.py:docstring of pkg.core.Agent.run:1: WARNING: py:class reference target not found: Foo [ref.class]
/repo/docs/source/old.rst: WARNING: document isn't included in any toctree
WARNING: autodoc: failed to import module 'missing'; the following exception was raised:
/repo/docs/source/api.rst:4: ERROR: Unknown directive type \"automodul\".
/repo/docs/source/api.rst:9: WARNING: duplicate object description of pkg.core, other instance in api, use :no-index: for one of them
build finished with problems, 6 warnings.
";

    fn analyze(text: &str) -> LogReport {
        LogAnalyzer::new().unwrap().analyze(text)
    }

    #[test]
    fn test_counts() {
        let report = analyze(LOG);
        assert_eq!(report.diagnostics.len(), 7);
        assert_eq!(report.warnings(), 6);
        assert_eq!(report.errors(), 1);
    }

    #[test]
    fn test_location_parsing() {
        let report = analyze(LOG);
        let first = &report.diagnostics[0];
        assert_eq!(first.file.as_deref(), Some("/repo/docs/source/index.rst"));
        assert_eq!(first.line, Some(12));
        assert_eq!(first.kind, DiagnosticKind::MissingReference);

        let doc = &report.diagnostics[1];
        assert_eq!(doc.file.as_deref(), Some("/repo/src/pkg/core.py"));
        assert_eq!(doc.line, Some(5));
        assert_eq!(doc.kind, DiagnosticKind::Docstring);

        let toc = &report.diagnostics[3];
        assert_eq!(toc.file.as_deref(), Some("/repo/docs/source/old.rst"));
        assert_eq!(toc.line, None);
        assert_eq!(toc.kind, DiagnosticKind::Toctree);
    }

    #[test]
    fn test_category_suffix_is_split_off() {
        let report = analyze(LOG);
        let d = &report.diagnostics[2];
        assert_eq!(d.category.as_deref(), Some("ref.class"));
        assert!(d.message.ends_with("not found: Foo"));
        assert_eq!(d.kind, DiagnosticKind::MissingReference);
    }

    #[test]
    fn test_kinds() {
        let report = analyze(LOG);
        let kinds: Vec<DiagnosticKind> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds[4], DiagnosticKind::Autodoc);
        assert_eq!(kinds[5], DiagnosticKind::Syntax);
        assert_eq!(kinds[6], DiagnosticKind::Duplicate);
        assert_eq!(report.by_kind[&DiagnosticKind::MissingReference], 2);
    }

    #[test]
    fn test_top_files_sorted_by_count() {
        let report = analyze(LOG);
        assert_eq!(report.top_files[0], ("/repo/docs/source/api.rst".to_string(), 2));
    }

    #[test]
    fn test_exception_block() {
        let log = "\
Exception occurred:
  File \"/usr/lib/python3/site-packages/sphinx/cmd/build.py\", line 298, in build_main
    app.build(args.force_all, args.filenames)
sphinx.errors.ExtensionError: Could not import extension sphinx_tabs.tabs

The full traceback has been saved in /tmp/sphinx-err.log
";
        let report = analyze(log);
        assert_eq!(report.diagnostics.len(), 1);
        let d = &report.diagnostics[0];
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.kind, DiagnosticKind::Extension);
        assert!(d.message.contains("sphinx_tabs"));
    }

    #[test]
    fn test_ansi_codes_stripped() {
        let report = analyze("\x1b[91mWARNING: toctree contains reference to nonexisting document 'x'\x1b[39;49;00m\n");
        assert_eq!(report.warnings(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Toctree);
    }

    #[test]
    fn test_clean_log() {
        let report = analyze("Running Sphinx v7.2.6\nbuild succeeded.\n");
        assert!(report.is_clean());
        assert!(report.render_text().starts_with("No warnings"));
    }

    #[test]
    fn test_text_and_json_output() {
        let report = analyze(LOG);
        let text = report.render_text();
        assert!(text.starts_with("6 warnings, 1 errors"));
        assert!(text.contains("Suggestions:"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["by_severity"]["warning"], 6);
        assert_eq!(json["diagnostics"][0]["kind"], "missing_reference");
    }
}
