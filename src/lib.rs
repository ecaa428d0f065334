//! pydevelop-docs - Sphinx documentation tooling for Python projects
//!
//! Scaffolds Sphinx docs for single packages and monorepos, resolves which
//! extensions to load and in what order, builds every package of a monorepo
//! in dependency order, and analyzes the resulting build logs.

pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod extensions;
pub mod logging;
pub mod output;
pub mod project;
pub mod sphinx;
pub mod tools;

// Re-export main types
pub use config::Config;
pub use error::{Error, Result};
pub use extensions::{ExtensionCatalog, ExtensionManager, ExtensionPlan};
pub use project::{Project, ProjectAnalyzer, PythonPackage};
