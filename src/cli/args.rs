//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sphinx documentation tooling for Python packages and monorepos
#[derive(Parser, Debug)]
#[command(name = "pydevelop-docs")]
#[command(about = "Sphinx documentation tooling for Python packages and monorepos")]
#[command(version)]
pub struct Args {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "PYDEVELOP_DOCS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold Sphinx docs for a package, or every package in a monorepo
    Init {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing docs directory
        #[arg(long)]
        force: bool,

        /// Show what would be written without writing
        #[arg(long)]
        dry_run: bool,

        /// Only scaffold this package (monorepo)
        #[arg(short, long)]
        package: Option<String>,

        /// HTML theme (furo, pydata, rtd, book, alabaster)
        #[arg(long)]
        theme: Option<String>,

        /// Extension profile (minimal, standard, full)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Build the docs of a single package, or a monorepo's hub docs
    Build {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Sphinx builder
        #[arg(short, long)]
        builder: Option<String>,

        /// Remove previous output first
        #[arg(long)]
        clean: bool,

        /// Turn Sphinx warnings into errors
        #[arg(short = 'W', long)]
        warnings_as_errors: bool,

        /// Build timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Build every package of a monorepo in dependency order
    BuildAll {
        /// Monorepo root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Number of packages built at once
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,

        /// Only build these packages (can be repeated)
        #[arg(short, long)]
        package: Vec<String>,

        /// Show the build order without running anything
        #[arg(long)]
        dry_run: bool,

        /// Per-package timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Sphinx builder
        #[arg(short, long)]
        builder: Option<String>,

        /// Remove previous output first
        #[arg(long)]
        clean: bool,

        /// Turn Sphinx warnings into errors
        #[arg(short = 'W', long)]
        warnings_as_errors: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check the environment and project
    Doctor {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Remove build output
    Clean {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// List what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate hub docs linking every package of a monorepo
    LinkDocs {
        /// Monorepo root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing hub directory
        #[arg(long)]
        force: bool,

        /// Show what would be written without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check docs requirements, optionally adding missing ones
    Deps {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Append missing packages to requirements.txt
        #[arg(long)]
        fix: bool,

        /// With --fix, show the additions without writing
        #[arg(long)]
        dry_run: bool,

        /// Only check this package (monorepo)
        #[arg(short, long)]
        package: Option<String>,
    },

    /// Summarize warnings and errors in a Sphinx build log
    AnalyzeLog {
        /// Log file
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit non-zero if the log has any warning or error
        #[arg(long)]
        fail_on_warning: bool,
    },

    /// List the extensions that would be loaded
    Extensions {
        /// Extension profile (minimal, standard, full)
        #[arg(long)]
        profile: Option<String>,

        /// Only these categories (can be repeated)
        #[arg(long)]
        category: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
