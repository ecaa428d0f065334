//! CLI module for pydevelop-docs

mod args;

pub use args::{Args, Command, OutputFormat};

use crate::build::{
    clean_dir, select_packages, BuildOptions, BuildResult, BuildSummary, MonorepoDocsBuilder,
    PackageConfig, ProcessRunner, SphinxBuilder,
};
use crate::config::{CliOverrides, Config};
use crate::error::{Error, Result};
use crate::extensions::{
    AssumeAvailable, AvailabilityProbe, Category, ExtensionCatalog, ExtensionManager,
    ExtensionRequest, PythonProbe,
};
use crate::logging::{default_level, init_tracing};
use crate::output::{DocsInitializer, HubBuilder, InitOptions, InitReport};
use crate::project::{Project, ProjectAnalyzer, PythonPackage};
use crate::tools::{DependencyChecker, Doctor, LogAnalyzer};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// Lines of sphinx-build stderr shown for a failed package
const STDERR_TAIL: usize = 20;

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();
    init_tracing(args.log_json, default_level(args.verbose));

    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<ExitCode> {
    let explicit = args.config.clone();
    let verbose = args.verbose;

    match args.command {
        Command::Init {
            path,
            force,
            dry_run,
            package,
            theme,
            profile,
        } => {
            let config = load_config(
                &path,
                explicit.as_deref(),
                CliOverrides {
                    theme,
                    profile,
                    ..Default::default()
                },
            )?;
            cmd_init(&config, &path, package.as_deref(), InitOptions { force, dry_run })
        }

        Command::Build {
            path,
            builder,
            clean,
            warnings_as_errors,
            timeout,
        } => {
            let config = load_config(
                &path,
                explicit.as_deref(),
                CliOverrides {
                    builder,
                    warnings_as_errors,
                    timeout_secs: timeout,
                    ..Default::default()
                },
            )?;
            cmd_build(&config, &path, clean)
        }

        Command::BuildAll {
            path,
            jobs,
            package,
            dry_run,
            timeout,
            builder,
            clean,
            warnings_as_errors,
            format,
        } => {
            let config = load_config(
                &path,
                explicit.as_deref(),
                CliOverrides {
                    workers: jobs,
                    timeout_secs: timeout,
                    builder,
                    warnings_as_errors,
                    ..Default::default()
                },
            )?;
            let progress = !verbose && format == OutputFormat::Text && std::io::stderr().is_terminal();
            cmd_build_all(&config, &path, &package, dry_run, clean, format, progress)
        }

        Command::Doctor { path, format } => {
            let config = load_config(&path, explicit.as_deref(), CliOverrides::default())?;
            let manager = extension_manager(&config, true)?;
            let report = Doctor::new(&config, &manager, Arc::new(ProcessRunner::new())).run(&path);
            match format {
                OutputFormat::Text => print!("{}", report.render_text()),
                OutputFormat::Json => print_json(&report)?,
            }
            Ok(exit_code(report.is_healthy()))
        }

        Command::Clean { path, dry_run } => {
            let config = load_config(&path, explicit.as_deref(), CliOverrides::default())?;
            cmd_clean(&config, &path, dry_run)
        }

        Command::LinkDocs {
            path,
            force,
            dry_run,
        } => {
            let config = load_config(&path, explicit.as_deref(), CliOverrides::default())?;
            let project = ProjectAnalyzer::new(config.clone()).analyze(&path)?;
            let manager = extension_manager(&config, false)?;
            let report = HubBuilder::new(&config, &manager)?.generate(&project, InitOptions { force, dry_run })?;
            print_init_report(&report);
            Ok(ExitCode::SUCCESS)
        }

        Command::Deps {
            path,
            fix,
            dry_run,
            package,
        } => {
            let config = load_config(&path, explicit.as_deref(), CliOverrides::default())?;
            cmd_deps(&config, &path, package.as_deref(), fix, dry_run)
        }

        Command::AnalyzeLog {
            file,
            format,
            fail_on_warning,
        } => {
            if !file.exists() {
                return Err(Error::PathNotFound(file));
            }
            let report = LogAnalyzer::new()?.analyze_file(&file)?;
            match format {
                OutputFormat::Text => print!("{}", report.render_text()),
                OutputFormat::Json => println!("{}", report.to_json()?),
            }
            Ok(exit_code(!(fail_on_warning && !report.is_clean())))
        }

        Command::Extensions {
            profile,
            category,
            format,
        } => {
            let config = load_config(
                Path::new("."),
                explicit.as_deref(),
                CliOverrides {
                    profile,
                    ..Default::default()
                },
            )?;
            cmd_extensions(&config, &category, format)
        }
    }
}

/// Discover config for `root`, then apply environment and flag overrides
fn load_config(root: &Path, explicit: Option<&Path>, overrides: CliOverrides) -> Result<Config> {
    let mut config = Config::discover(root, explicit)?;
    config.apply_env()?;
    config.merge_cli(overrides)?;
    debug!(?config, "configuration resolved");
    Ok(config)
}

/// Extension manager over the built-in catalogue.
///
/// With `probe_python` the configured interpreter decides what is installed;
/// otherwise every extension is assumed available.
fn extension_manager(config: &Config, probe_python: bool) -> Result<ExtensionManager> {
    let probe: Box<dyn AvailabilityProbe> = if probe_python {
        Box::new(PythonProbe::new(&config.build.python))
    } else {
        Box::new(AssumeAvailable)
    };
    Ok(ExtensionManager::new(ExtensionCatalog::builtin()?, probe))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_init_report(report: &InitReport) {
    println!("{}", report.summary());
    if report.dry_run {
        for path in &report.written {
            println!("  {}", path.display());
        }
    }
}

/// Packages named by `--package`, or all of them
fn target_packages<'p>(project: &'p Project, name: Option<&str>) -> Result<Vec<&'p PythonPackage>> {
    match name {
        Some(name) => project
            .package(name)
            .map(|p| vec![p])
            .ok_or_else(|| Error::discovery(format!("no package named {}", name))),
        None => Ok(project.packages.iter().collect()),
    }
}

fn cmd_init(config: &Config, path: &Path, package: Option<&str>, options: InitOptions) -> Result<ExitCode> {
    let project = ProjectAnalyzer::new(config.clone()).analyze(path)?;
    let manager = extension_manager(config, false)?;
    let initializer = DocsInitializer::new(config, &manager)?;

    let mut failures = 0;
    for pkg in target_packages(&project, package)? {
        let siblings: Vec<&PythonPackage> = pkg
            .internal_deps
            .iter()
            .filter_map(|dep| project.package(dep))
            .collect();
        match initializer.init(pkg, &siblings, options) {
            Ok(report) => print_init_report(&report),
            Err(e) => {
                eprintln!("{}: {}", pkg.name(), e);
                failures += 1;
            }
        }
    }

    if project.is_monorepo() && package.is_none() {
        match HubBuilder::new(config, &manager)?.generate(&project, options) {
            Ok(report) => print_init_report(&report),
            Err(e) => {
                eprintln!("hub: {}", e);
                failures += 1;
            }
        }
    }

    Ok(exit_code(failures == 0))
}

/// Build target for the monorepo's hub docs
fn hub_package_config(project: &Project, config: &Config) -> PackageConfig {
    let hub = project.root.join(&config.monorepo.hub_dir);
    PackageConfig {
        name: project.display_name(),
        root: project.root.clone(),
        docs_source: hub.join(&config.docs.source_dir),
        build_dir: hub.join(&config.docs.build_dir),
        dependencies: Vec::new(),
    }
}

fn sphinx_builder(config: &Config, clean: bool) -> SphinxBuilder {
    let mut options = BuildOptions::from_config(config);
    options.clean = clean;
    SphinxBuilder::new(Arc::new(ProcessRunner::new()), options)
}

fn cmd_build(config: &Config, path: &Path, clean: bool) -> Result<ExitCode> {
    let project = ProjectAnalyzer::new(config.clone()).analyze(path)?;
    let target = if project.is_monorepo() {
        hub_package_config(&project, config)
    } else {
        let package = project
            .packages
            .first()
            .ok_or_else(|| Error::discovery("no package found"))?;
        PackageConfig::from_package(package, config)
    };

    let result = sphinx_builder(config, clean).build(&target);
    print_failure_details(&result);
    let summary = BuildSummary {
        results: vec![result],
    };
    print!("{}", summary.render_text());
    if summary.exit_code() == 0 {
        println!(
            "Output: {}",
            target.output_dir(&config.build.builder).display()
        );
    }
    Ok(exit_code(summary.exit_code() == 0))
}

fn cmd_build_all(
    config: &Config,
    path: &Path,
    selected: &[String],
    dry_run: bool,
    clean: bool,
    format: OutputFormat,
    progress: bool,
) -> Result<ExitCode> {
    let project = ProjectAnalyzer::new(config.clone()).analyze(path)?;
    let packages: Vec<PackageConfig> = project
        .packages
        .iter()
        .map(|p| PackageConfig::from_package(p, config))
        .collect();
    let packages = select_packages(packages, selected)?;

    let scheduler = MonorepoDocsBuilder::new(sphinx_builder(config, clean), config.build.workers)
        .with_progress(progress);
    let summary = if dry_run {
        scheduler.dry_run(&packages)
    } else {
        scheduler.build_all(&packages)?
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            if dry_run {
                for result in &summary.results {
                    match &result.command {
                        Some(command) => println!("{}: {}", result.package, command),
                        None => println!("{}: {}", result.package, result.status),
                    }
                }
            } else {
                for result in &summary.results {
                    print_failure_details(result);
                }
                print!("{}", summary.render_text());
            }
        }
    }

    Ok(exit_code(summary.exit_code() == 0))
}

fn print_failure_details(result: &BuildResult) {
    if !result.status.is_failure() || result.stderr.trim().is_empty() {
        return;
    }
    eprintln!("--- {} ({}) ---", result.package, result.status);
    let lines: Vec<&str> = result.stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL);
    for line in &lines[start..] {
        eprintln!("{}", line);
    }
}

fn cmd_clean(config: &Config, path: &Path, dry_run: bool) -> Result<ExitCode> {
    let project = ProjectAnalyzer::new(config.clone()).analyze(path)?;
    let mut dirs: Vec<PathBuf> = project
        .packages
        .iter()
        .map(|p| config.docs.build_path(&p.root))
        .collect();
    if project.is_monorepo() {
        dirs.push(hub_package_config(&project, config).build_dir);
    }

    let mut removed = 0;
    for dir in dirs.iter().filter(|d| d.exists()) {
        if dry_run {
            println!("Would remove {}", dir.display());
        } else if clean_dir(dir)? {
            println!("Removed {}", dir.display());
        }
        removed += 1;
    }
    if removed == 0 {
        println!("Nothing to clean");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_deps(
    config: &Config,
    path: &Path,
    package: Option<&str>,
    fix: bool,
    dry_run: bool,
) -> Result<ExitCode> {
    let project = ProjectAnalyzer::new(config.clone()).analyze(path)?;
    let manager = extension_manager(config, true)?;
    let checker = DependencyChecker::new(config, &manager);
    let plan = manager.plan(&ExtensionRequest::from_docs(&config.docs));

    let mut unsatisfied = 0;
    for pkg in target_packages(&project, package)? {
        let report = checker.check(pkg, &plan)?;
        print!("{}", report.render_text());

        if fix {
            let added = checker.fix(&report, &report.requirements_path, dry_run)?;
            let verb = if dry_run { "Would add" } else { "Added" };
            for line in &added {
                println!("  {} {}", verb, line);
            }
            if !report.unavailable.is_empty() {
                println!(
                    "  Install with: pip install -r {}",
                    report.requirements_path.display()
                );
            }
        } else if !report.is_satisfied() {
            unsatisfied += 1;
        }
    }

    Ok(exit_code(unsatisfied == 0))
}

#[derive(Serialize)]
struct ExtensionRow<'a> {
    name: &'a str,
    package: &'a str,
    category: Category,
    priority: i32,
}

fn cmd_extensions(config: &Config, categories: &[String], format: OutputFormat) -> Result<ExitCode> {
    let manager = extension_manager(config, true)?;
    let mut request = ExtensionRequest::from_docs(&config.docs);
    request.categories = categories
        .iter()
        .map(|c| c.parse())
        .collect::<Result<Vec<Category>>>()?;
    let plan = manager.plan(&request);

    let rows: Vec<ExtensionRow> = plan
        .order
        .iter()
        .filter_map(|name| manager.catalog().get(name))
        .map(|spec| ExtensionRow {
            name: &spec.name,
            package: &spec.package,
            category: spec.category,
            priority: spec.priority,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Listing<'a> {
                profile: String,
                extensions: Vec<ExtensionRow<'a>>,
                dropped: &'a [crate::extensions::DroppedExtension],
            }
            print_json(&Listing {
                profile: config.docs.profile.to_string(),
                extensions: rows,
                dropped: &plan.dropped,
            })?;
        }
        OutputFormat::Text => {
            println!("Profile: {} ({} extensions)", config.docs.profile, rows.len());
            for row in &rows {
                println!(
                    "  {:<44} {:<12} {}",
                    row.name,
                    row.category.as_str(),
                    row.package
                );
            }
            for dropped in &plan.dropped {
                println!("  - {} ({:?})", dropped.name, dropped.reason);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
