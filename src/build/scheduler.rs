// Dependency-ordered parallel builds across a monorepo

use crate::build::sphinx::{BuildResult, BuildStatus, BuildSummary, PackageConfig, SphinxBuilder};
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Build order assuming every build succeeds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub waves: Vec<Vec<String>>,
    /// Packages that can never become ready
    pub cycle: Vec<String>,
}

/// Builds many packages, dependencies first, several at a time
pub struct MonorepoDocsBuilder {
    builder: SphinxBuilder,
    workers: usize,
    progress: bool,
}

impl MonorepoDocsBuilder {
    pub fn new(builder: SphinxBuilder, workers: usize) -> Self {
        Self {
            builder,
            workers: workers.max(1),
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Group packages into waves whose members only depend on earlier waves
    pub fn plan_waves(packages: &[PackageConfig]) -> WavePlan {
        let known: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let mut done: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&PackageConfig> = packages.iter().collect();
        let mut plan = WavePlan::default();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|p| internal_deps(p, &known).all(|d| done.contains(d)));

            if ready.is_empty() {
                plan.cycle = waiting.iter().map(|p| p.name.clone()).collect();
                break;
            }

            done.extend(ready.iter().map(|p| p.name.as_str()));
            plan.waves.push(ready.iter().map(|p| p.name.clone()).collect());
            pending = waiting;
        }

        plan
    }

    /// Dependency cycles among `packages`, each sorted by name
    pub fn find_cycles(packages: &[PackageConfig]) -> Vec<Vec<String>> {
        let mut graph = DiGraph::<&str, ()>::new();
        let nodes: HashMap<&str, _> = packages
            .iter()
            .map(|p| (p.name.as_str(), graph.add_node(p.name.as_str())))
            .collect();

        for package in packages {
            for dep in &package.dependencies {
                if let Some(&to) = nodes.get(dep.as_str()) {
                    graph.add_edge(nodes[package.name.as_str()], to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> = scc.iter().map(|&n| graph[n].to_string()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Report what would run, in order, without running anything
    pub fn dry_run(&self, packages: &[PackageConfig]) -> BuildSummary {
        let plan = Self::plan_waves(packages);
        let by_name: HashMap<&str, &PackageConfig> =
            packages.iter().map(|p| (p.name.as_str(), p)).collect();

        let mut summary = BuildSummary::default();
        for name in plan.waves.iter().flatten() {
            let mut result = BuildResult::not_run(name.as_str(), BuildStatus::Skipped);
            result.command = by_name.get(name.as_str()).map(|p| self.builder.command(p).display());
            summary.results.push(result);
        }
        for name in plan.cycle {
            summary.results.push(BuildResult::not_run(name, BuildStatus::Cycle));
        }
        summary
    }

    /// Build every package. Each one appears in the summary exactly once.
    ///
    /// A package runs only after all of its in-repo dependencies succeeded;
    /// dependencies outside `packages` count as satisfied.
    pub fn build_all(&self, packages: &[PackageConfig]) -> Result<BuildSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::build(format!("could not start worker pool: {}", e)))?;

        let known: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let progress = self.progress_bar(packages.len());

        let mut succeeded: HashMap<String, bool> = HashMap::new();
        let mut summary = BuildSummary::default();
        let mut pending: Vec<&PackageConfig> = packages.iter().collect();
        let mut wave = 0;

        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|p| internal_deps(p, &known).all(|d| succeeded.contains_key(d)));

            if ready.is_empty() {
                for cycle in Self::find_cycles(packages) {
                    warn!(packages = %cycle.join(" -> "), "dependency cycle");
                }
                for package in waiting {
                    progress.inc(1);
                    summary
                        .results
                        .push(BuildResult::not_run(&package.name, BuildStatus::Cycle));
                }
                break;
            }

            let mut runnable = Vec::with_capacity(ready.len());
            for package in ready {
                let broken = internal_deps(package, &known).find(|d| !succeeded[*d]);
                match broken {
                    Some(dep) => {
                        info!(package = %package.name, dependency = %dep, "blocked");
                        progress.inc(1);
                        summary.results.push(BuildResult::not_run(
                            &package.name,
                            BuildStatus::Blocked { by: dep.to_string() },
                        ));
                        succeeded.insert(package.name.clone(), false);
                    }
                    None => runnable.push(package),
                }
            }

            wave += 1;
            info!(wave, packages = runnable.len(), "starting wave");
            let results: Vec<BuildResult> = pool.install(|| {
                runnable
                    .par_iter()
                    .map(|package| {
                        progress.set_message(package.name.clone());
                        let result = self.builder.build(package);
                        progress.inc(1);
                        result
                    })
                    .collect()
            });

            for result in results {
                succeeded.insert(result.package.clone(), result.status.is_success());
                summary.results.push(result);
            }
            pending = waiting;
        }

        progress.finish_and_clear();
        Ok(summary)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}

/// Dependencies of `package` that are part of this run
fn internal_deps<'a>(
    package: &'a PackageConfig,
    known: &'a HashSet<&'a str>,
) -> impl Iterator<Item = &'a str> + 'a {
    package
        .dependencies
        .iter()
        .map(String::as_str)
        .filter(move |d| known.contains(d) && *d != package.name)
}

/// Restrict `packages` to the named ones, matching case-insensitively
pub fn select_packages(packages: Vec<PackageConfig>, names: &[String]) -> Result<Vec<PackageConfig>> {
    if names.is_empty() {
        return Ok(packages);
    }
    let wanted: Vec<String> = names.iter().map(|n| crate::project::normalize_name(n)).collect();
    for name in &wanted {
        if !packages.iter().any(|p| crate::project::normalize_name(&p.name) == *name) {
            return Err(Error::build(format!("no package named {}", name)));
        }
    }
    Ok(packages
        .into_iter()
        .filter(|p| wanted.contains(&crate::project::normalize_name(&p.name)))
        .collect())
}
