use std::path::PathBuf;
use thiserror::Error;

/// pydevelop-docs error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid pyproject.toml at {path}: {message}")]
    Pyproject { path: PathBuf, message: String },

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Extension catalogue error: {0}")]
    Catalog(String),

    #[error("Docs already initialized at {0} (use --force to overwrite)")]
    AlreadyInitialized(PathBuf),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for pydevelop-docs operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config validation error
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Error::ConfigValidation(msg.into())
    }

    /// Create a pyproject error
    pub fn pyproject(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Pyproject {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Error::Discovery(msg.into())
    }

    /// Create a catalogue error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Error::Catalog(msg.into())
    }

    /// Create a build error
    pub fn build(msg: impl Into<String>) -> Self {
        Error::Build(msg.into())
    }

    /// Create a spawn error for a program that could not be started
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Error::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
