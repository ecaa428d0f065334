// Extension selection, ordering and configuration merging

use crate::config::DocsConfig;
use crate::extensions::catalog::{Category, ExtensionCatalog, ExtensionSpec, Profile};
use crate::extensions::probe::AvailabilityProbe;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// What the caller wants loaded, before filtering and ordering
#[derive(Debug, Clone, Default)]
pub struct ExtensionRequest {
    pub profile: Profile,
    /// Replaces the profile list when set
    pub explicit: Option<Vec<String>>,
    pub extra: Vec<String>,
    pub disable: Vec<String>,
    /// Keep only these categories; empty keeps everything
    pub categories: Vec<Category>,
}

impl ExtensionRequest {
    pub fn from_docs(docs: &DocsConfig) -> Self {
        Self {
            profile: docs.profile,
            explicit: docs.extension_set.clone(),
            extra: docs.extensions.clone(),
            disable: docs.disable.clone(),
            categories: Vec::new(),
        }
    }
}

/// Why an extension did not make it into the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    Unknown,
    Unavailable,
    Conflict { with: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedExtension {
    pub name: String,
    pub reason: DropReason,
}

/// Final, ordered extension selection with merged settings
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtensionPlan {
    pub order: Vec<String>,
    pub config: Map<String, Value>,
    pub dropped: Vec<DroppedExtension>,
}

impl ExtensionPlan {
    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Filters, orders and configures extensions from a catalogue
pub struct ExtensionManager {
    catalog: ExtensionCatalog,
    probe: Box<dyn AvailabilityProbe>,
}

impl ExtensionManager {
    pub fn new(catalog: ExtensionCatalog, probe: Box<dyn AvailabilityProbe>) -> Self {
        Self { catalog, probe }
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    pub fn probe(&self) -> &dyn AvailabilityProbe {
        self.probe.as_ref()
    }

    /// Split `names` into importable and missing extensions
    pub fn filter_available(&self, names: &[String]) -> (Vec<String>, Vec<String>) {
        let found = self.probe.available(names);
        let (available, missing): (Vec<String>, Vec<String>) =
            names.iter().cloned().partition(|n| found.contains(n));

        for name in &missing {
            let package = self
                .catalog
                .get(name)
                .map(|s| s.package.as_str())
                .unwrap_or("?");
            warn!(extension = %name, package, "extension not installed, disabling");
        }

        (available, missing)
    }

    /// Keep extensions whose category is listed. Unknown names are dropped.
    pub fn filter_by_category(&self, names: &[String], categories: &[Category]) -> Vec<String> {
        names
            .iter()
            .filter(|n| {
                self.catalog
                    .get(n)
                    .map_or(false, |s| categories.contains(&s.category))
            })
            .cloned()
            .collect()
    }

    /// Order extensions so requirements load before their dependents.
    ///
    /// Only requirements that are themselves requested take part. Ties are
    /// broken by ascending priority, then name. Unknown extensions are dropped.
    /// On a cycle the requested order is returned unchanged (minus duplicates).
    pub fn resolve_dependencies(&self, names: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut requested: Vec<&ExtensionSpec> = Vec::new();
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.catalog.get(name) {
                Some(spec) => requested.push(spec),
                None => warn!(extension = %name, "unknown extension dropped"),
            }
        }

        let fallback: Vec<String> = requested.iter().map(|s| s.name.clone()).collect();
        let requested_set: HashSet<&str> = requested.iter().map(|s| s.name.as_str()).collect();

        let mut roots = requested.clone();
        roots.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(roots.len());
        for spec in roots {
            if let Err(mut cycle) = self.visit(spec, &requested_set, &mut marks, &mut order) {
                cycle.reverse();
                warn!(
                    cycle = %cycle.join(" -> "),
                    "extension dependency cycle, keeping requested order"
                );
                return fallback;
            }
        }

        debug!(order = ?order, "resolved extension order");
        order
    }

    fn visit<'c>(
        &'c self,
        spec: &'c ExtensionSpec,
        requested: &HashSet<&str>,
        marks: &mut HashMap<&'c str, Mark>,
        order: &mut Vec<String>,
    ) -> std::result::Result<(), Vec<String>> {
        match marks.get(spec.name.as_str()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(vec![spec.name.clone()]),
            None => {}
        }
        marks.insert(spec.name.as_str(), Mark::Visiting);

        let mut deps: Vec<&ExtensionSpec> = spec
            .requires
            .iter()
            .filter(|r| requested.contains(r.as_str()))
            .filter_map(|r| self.catalog.get(r))
            .collect();
        deps.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        for dep in deps {
            if let Err(mut path) = self.visit(dep, requested, marks, order) {
                path.push(spec.name.clone());
                return Err(path);
            }
        }

        marks.insert(spec.name.as_str(), Mark::Done);
        order.push(spec.name.clone());
        Ok(())
    }

    /// Drop the lower-priority side of every conflicting pair.
    ///
    /// Returns the surviving names in their original order, plus
    /// `(dropped, kept_instead)` pairs.
    pub fn remove_conflicts(&self, order: &[String]) -> (Vec<String>, Vec<(String, String)>) {
        let mut by_priority: Vec<&ExtensionSpec> =
            order.iter().filter_map(|n| self.catalog.get(n)).collect();
        by_priority.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut kept: Vec<&ExtensionSpec> = Vec::new();
        let mut dropped = Vec::new();
        for spec in by_priority {
            let winner = kept
                .iter()
                .find(|k| k.conflicts_with(&spec.name) || spec.conflicts_with(&k.name));
            match winner {
                Some(winner) => {
                    warn!(
                        extension = %spec.name,
                        conflicts_with = %winner.name,
                        "conflicting extension dropped"
                    );
                    dropped.push((spec.name.clone(), winner.name.clone()));
                }
                None => kept.push(spec),
            }
        }

        let dropped_names: HashSet<&str> = dropped.iter().map(|(n, _)| n.as_str()).collect();
        let survivors = order
            .iter()
            .filter(|n| !dropped_names.contains(n.as_str()))
            .cloned()
            .collect();

        (survivors, dropped)
    }

    /// Merge each extension's settings in load order
    pub fn merge_config(&self, order: &[String]) -> Map<String, Value> {
        let mut merged = Map::new();
        for spec in order.iter().filter_map(|n| self.catalog.get(n)) {
            merge_settings(&mut merged, &spec.config);
        }
        merged
    }

    /// Run the full selection pipeline for a request
    pub fn plan(&self, request: &ExtensionRequest) -> ExtensionPlan {
        let base = request
            .explicit
            .clone()
            .unwrap_or_else(|| self.catalog.profile(request.profile));

        let disabled: HashSet<&str> = request.disable.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let names: Vec<String> = base
            .iter()
            .chain(request.extra.iter())
            .filter(|n| !disabled.contains(n.as_str()))
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect();

        let mut dropped = Vec::new();

        let (known, unknown): (Vec<String>, Vec<String>) =
            names.into_iter().partition(|n| self.catalog.contains(n));
        for name in unknown {
            warn!(extension = %name, "unknown extension dropped");
            dropped.push(DroppedExtension {
                name,
                reason: DropReason::Unknown,
            });
        }

        let known = if request.categories.is_empty() {
            known
        } else {
            self.filter_by_category(&known, &request.categories)
        };

        let (available, missing) = self.filter_available(&known);
        dropped.extend(missing.into_iter().map(|name| DroppedExtension {
            name,
            reason: DropReason::Unavailable,
        }));

        let order = self.resolve_dependencies(&available);
        let (order, conflicts) = self.remove_conflicts(&order);
        dropped.extend(conflicts.into_iter().map(|(name, with)| DroppedExtension {
            name,
            reason: DropReason::Conflict { with },
        }));

        self.warn_missing_requirements(&order);

        let config = self.merge_config(&order);
        ExtensionPlan {
            order,
            config,
            dropped,
        }
    }

    fn warn_missing_requirements(&self, order: &[String]) {
        let present: HashSet<&str> = order.iter().map(String::as_str).collect();
        for spec in order.iter().filter_map(|n| self.catalog.get(n)) {
            for req in spec.requires.iter().filter(|r| !present.contains(r.as_str())) {
                warn!(extension = %spec.name, requires = %req, "required extension not enabled");
            }
        }
    }
}

/// Deep-merge `source` into `target`. Nested tables merge, everything else
/// is replaced.
pub fn merge_settings(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (target.get_mut(key), value)
        {
            merge_settings(existing, incoming);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}
