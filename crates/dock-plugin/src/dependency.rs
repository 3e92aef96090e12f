//! Dependency resolution between plugins.
//!
//! Ranges use npm-style syntax as understood by `semver::VersionReq`
//! (`^`, `~`, `>=`, `>`, `<=`, `<`, `*`). A bare version means an exact
//! match. Plugins that cannot be satisfied are reported individually and
//! the rest are returned in load order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use semver::{Version, VersionReq};

use crate::error::DependencyError;
use crate::manifest::PluginManifest;

/// Result of resolving a batch of plugins.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Plugin names, dependencies first.
    pub order: Vec<String>,
    /// Plugins that cannot be loaded, with the reason.
    pub failures: BTreeMap<String, DependencyError>,
}

/// Parse a declared range.
pub fn parse_range(range: &str) -> Result<VersionReq, semver::Error> {
    let range = range.trim();
    if range == "*" {
        return Ok(VersionReq::STAR);
    }
    if let Ok(exact) = Version::parse(range) {
        return VersionReq::parse(&format!("={exact}"));
    }
    VersionReq::parse(range)
}

/// Order `candidates` so every plugin follows its dependencies.
///
/// `installed` holds versions of plugins already running outside the batch.
/// Versions from the batch take precedence.
pub fn resolve(candidates: &[PluginManifest], installed: &HashMap<String, String>) -> Resolution {
    let mut resolution = Resolution::default();
    let batch: BTreeMap<&str, &PluginManifest> =
        candidates.iter().map(|m| (m.name.as_str(), m)).collect();

    for manifest in batch.values() {
        if let Err(err) = check_declared(manifest, &batch, installed) {
            resolution.failures.insert(manifest.name.clone(), err);
        }
    }

    // A plugin whose in-batch dependency failed cannot load either.
    loop {
        let mut newly_failed = Vec::new();
        for manifest in batch.values() {
            if resolution.failures.contains_key(&manifest.name) {
                continue;
            }
            if let Some(dependency) = manifest
                .dependencies
                .keys()
                .find(|d| resolution.failures.contains_key(d.as_str()))
            {
                newly_failed.push(DependencyError::Unavailable {
                    plugin: manifest.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        if newly_failed.is_empty() {
            break;
        }
        for err in newly_failed {
            if let DependencyError::Unavailable { plugin, .. } = &err {
                resolution.failures.insert(plugin.clone(), err.clone());
            }
        }
    }

    // Kahn's algorithm over the surviving batch members.
    let alive: BTreeSet<&str> = batch
        .keys()
        .copied()
        .filter(|name| !resolution.failures.contains_key(*name))
        .collect();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for &name in &alive {
        let edges: Vec<&str> = batch[name]
            .dependencies
            .keys()
            .map(String::as_str)
            .filter(|d| alive.contains(d))
            .collect();
        in_degree.insert(name, edges.len());
        for dependency in edges {
            dependents.entry(dependency).or_default().push(name);
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    while let Some(name) = ready.pop_first() {
        resolution.order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let stuck: Vec<String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree > 0)
        .map(|(name, _)| name.to_string())
        .collect();
    for name in &stuck {
        resolution.failures.insert(
            name.clone(),
            DependencyError::Cycle {
                plugins: stuck.clone(),
            },
        );
    }

    resolution
}

fn check_declared(
    manifest: &PluginManifest,
    batch: &BTreeMap<&str, &PluginManifest>,
    installed: &HashMap<String, String>,
) -> Result<(), DependencyError> {
    for (dependency, range) in &manifest.dependencies {
        let found = match batch.get(dependency.as_str()) {
            Some(m) => m.version.as_str(),
            None => installed
                .get(dependency)
                .map(String::as_str)
                .ok_or_else(|| DependencyError::Missing {
                    plugin: manifest.name.clone(),
                    dependency: dependency.clone(),
                })?,
        };

        let requirement = parse_range(range).map_err(|_| DependencyError::InvalidRange {
            plugin: manifest.name.clone(),
            dependency: dependency.clone(),
            range: range.clone(),
        })?;
        let version = Version::parse(found).map_err(|_| DependencyError::InvalidVersion {
            plugin: dependency.clone(),
            version: found.to_string(),
        })?;

        if !requirement.matches(&version) {
            return Err(DependencyError::VersionMismatch {
                plugin: manifest.name.clone(),
                dependency: dependency.clone(),
                required: range.clone(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}
