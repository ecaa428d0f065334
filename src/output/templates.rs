// Template engine for generating docs scaffolding

use crate::config::Config;
use crate::error::Result;
use crate::output::pyliteral::{intersphinx_literal, to_python_literal, to_python_literal_pretty};
use crate::sphinx::SphinxConfig;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

/// Version stamped into generated files
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One rendered `name = value` line in conf.py
#[derive(Debug, Serialize)]
struct Setting {
    name: String,
    value: String,
}

/// Package entry on the monorepo hub page
#[derive(Debug, Clone, Serialize)]
pub struct HubEntry {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// Relative link to the package's built index.html
    pub link: String,
}

/// Template engine wrapping Tera with custom filters and templates
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Create a new template engine with embedded templates
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("conf.py", include_str!("../../templates/conf.py.tera")),
            ("index.rst", include_str!("../../templates/index.rst.tera")),
            ("api.rst", include_str!("../../templates/api.rst.tera")),
            ("changelog.rst", include_str!("../../templates/changelog.rst.tera")),
            ("Makefile", include_str!("../../templates/Makefile.tera")),
            ("requirements.txt", include_str!("../../templates/requirements.txt.tera")),
            ("gitignore", include_str!("../../templates/gitignore.tera")),
            ("hub_index.rst", include_str!("../../templates/hub_index.rst.tera")),
        ])?;

        tera.register_filter("pyrepr", pyrepr);
        tera.register_filter("rst_underline", rst_underline);

        Ok(Self { tera })
    }

    /// Render conf.py
    pub fn render_conf_py(&self, conf: &SphinxConfig) -> Result<String> {
        let settings: Vec<Setting> = conf
            .settings
            .iter()
            .map(|(name, value)| Setting {
                name: name.clone(),
                value: to_python_literal_pretty(value, 0),
            })
            .collect();

        let extensions = Value::Array(
            conf.extensions
                .iter()
                .map(|e| Value::String(e.clone()))
                .collect(),
        );

        let intersphinx = if conf.intersphinx_mapping.is_empty() {
            None
        } else {
            Some(intersphinx_literal(&conf.intersphinx_mapping))
        };

        let mut context = Context::new();
        context.insert("tool_version", TOOL_VERSION);
        context.insert("conf", conf);
        context.insert("extensions_literal", &to_python_literal_pretty(&extensions, 0));
        context.insert("intersphinx_literal", &intersphinx);
        context.insert("settings", &settings);
        context.insert(
            "theme_options_literal",
            &to_python_literal_pretty(&Value::Object(conf.html_theme_options.clone()), 0),
        );

        Ok(self.tera.render("conf.py", &context)?)
    }

    /// Render the root index.rst of a package
    pub fn render_index(
        &self,
        title: &str,
        description: Option<&str>,
        has_autoapi: bool,
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("description", &description);
        context.insert("has_autoapi", &has_autoapi);
        Ok(self.tera.render("index.rst", &context)?)
    }

    /// Render an automodule page for packages without AutoAPI
    pub fn render_api(&self, modules: &[String]) -> Result<String> {
        let mut context = Context::new();
        context.insert("modules", modules);
        Ok(self.tera.render("api.rst", &context)?)
    }

    pub fn render_changelog(&self, version: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("version", version);
        Ok(self.tera.render("changelog.rst", &context)?)
    }

    pub fn render_makefile(&self, config: &Config) -> Result<String> {
        let mut context = Context::new();
        context.insert("tool_version", TOOL_VERSION);
        context.insert("sphinx_build", &config.build.sphinx_build);
        context.insert("source_dir", &config.docs.source_dir.to_string_lossy());
        context.insert("build_dir", &config.docs.build_dir.to_string_lossy());
        Ok(self.tera.render("Makefile", &context)?)
    }

    pub fn render_requirements(&self, requirements: &[String]) -> Result<String> {
        let mut context = Context::new();
        context.insert("requirements", requirements);
        Ok(self.tera.render("requirements.txt", &context)?)
    }

    pub fn render_gitignore(&self, config: &Config) -> Result<String> {
        let mut context = Context::new();
        context.insert("source_dir", &config.docs.source_dir.to_string_lossy());
        context.insert("build_dir", &config.docs.build_dir.to_string_lossy());
        Ok(self.tera.render("gitignore", &context)?)
    }

    /// Render the monorepo hub index page
    pub fn render_hub_index(&self, title: &str, packages: &[HubEntry]) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("packages", packages);
        Ok(self.tera.render("hub_index.rst", &context)?)
    }
}

/// Render any value as a Python literal
fn pyrepr(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(to_python_literal(value)))
}

/// RST section underline as long as the text
fn rst_underline(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value.as_str().unwrap_or("");
    let ch = args
        .get("char")
        .and_then(|v| v.as_str())
        .and_then(|s| s.chars().next())
        .unwrap_or('=');
    Ok(Value::String(underline(text, ch)))
}

/// Build an RST underline for `text`
pub fn underline(text: &str, ch: char) -> String {
    std::iter::repeat(ch).take(text.chars().count().max(1)).collect()
}
