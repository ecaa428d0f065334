// Supported HTML themes

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Theme {
    #[default]
    #[serde(rename = "furo")]
    Furo,
    #[serde(rename = "pydata_sphinx_theme")]
    PyData,
    #[serde(rename = "sphinx_rtd_theme")]
    ReadTheDocs,
    #[serde(rename = "sphinx_book_theme")]
    Book,
    #[serde(rename = "alabaster")]
    Alabaster,
}

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Furo,
        Theme::PyData,
        Theme::ReadTheDocs,
        Theme::Book,
        Theme::Alabaster,
    ];

    /// Value for `html_theme`
    pub fn html_theme(&self) -> &'static str {
        match self {
            Theme::Furo => "furo",
            Theme::PyData => "pydata_sphinx_theme",
            Theme::ReadTheDocs => "sphinx_rtd_theme",
            Theme::Book => "sphinx_book_theme",
            Theme::Alabaster => "alabaster",
        }
    }

    /// pip package providing the theme
    pub fn package(&self) -> &'static str {
        match self {
            Theme::Furo => "furo",
            Theme::PyData => "pydata-sphinx-theme",
            Theme::ReadTheDocs => "sphinx-rtd-theme",
            Theme::Book => "sphinx-book-theme",
            Theme::Alabaster => "alabaster",
        }
    }

    /// Default `html_theme_options`
    pub fn default_options(&self) -> Map<String, Value> {
        let options = match self {
            Theme::Furo => json!({
                "sidebar_hide_name": false,
                "navigation_with_keys": true,
            }),
            Theme::PyData => json!({
                "show_toc_level": 2,
                "navigation_with_keys": true,
                "show_prev_next": true,
            }),
            Theme::ReadTheDocs => json!({
                "navigation_depth": 4,
                "collapse_navigation": false,
                "sticky_navigation": true,
            }),
            Theme::Book => json!({
                "show_toc_level": 2,
                "use_download_button": true,
            }),
            Theme::Alabaster => json!({
                "fixed_sidebar": true,
            }),
        };

        match options {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.html_theme())
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "furo" => Ok(Theme::Furo),
            "pydata" | "pydata_sphinx_theme" => Ok(Theme::PyData),
            "rtd" | "sphinx_rtd_theme" => Ok(Theme::ReadTheDocs),
            "book" | "sphinx_book_theme" => Ok(Theme::Book),
            "alabaster" => Ok(Theme::Alabaster),
            other => Err(Error::config_validation(format!("unknown theme: {}", other))),
        }
    }
}
