//! `plugin.json` manifest parsing and validation.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// File name of the manifest at the root of every plugin folder.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// Inputs longer than this are rejected before pattern matching.
const MAX_PATTERN_INPUT: usize = 256;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*(\.[a-z][a-z0-9-]*)+$").unwrap());

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(-[a-zA-Z0-9.-]+)?(\+[a-zA-Z0-9.-]+)?$").unwrap()
});

/// Declarative description of a plugin package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginManifest {
    /// Reverse-domain unique name, e.g. `com.acme.notes`.
    pub name: String,
    /// Human-readable name.
    pub display_name: Option<String>,
    /// Semantic version.
    pub version: String,
    /// Short description.
    pub description: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// License identifier.
    pub license: Option<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Library file name, relative to the plugin folder.
    pub main: String,
    /// Entry type exported by the library.
    pub entry_class: String,
    /// Plugin name → version range.
    pub dependencies: BTreeMap<String, String>,
    /// Engine name → version.
    pub engines: BTreeMap<String, String>,
}

impl PluginManifest {
    /// Parse a manifest from JSON text. Unknown fields are ignored.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Check required fields and formats. Stops at the first failure.
    pub fn validate(&self) -> Result<(), ManifestError> {
        require("name", &self.name)?;
        require("version", &self.version)?;
        require("main", &self.main)?;
        require("entryClass", &self.entry_class)?;

        if !is_valid_name(&self.name) {
            return Err(invalid(
                "name",
                "must be lowercase reverse-domain notation, e.g. com.example.plugin",
            ));
        }

        if !is_valid_version(&self.version) {
            return Err(invalid(
                "version",
                "must be a semantic version, e.g. 1.0.0 or 1.0.0-beta",
            ));
        }

        let extension = std::env::consts::DLL_EXTENSION;
        let has_extension = Path::new(&self.main)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !has_extension {
            return Err(invalid(
                "main",
                &format!("must name a .{extension} library"),
            ));
        }

        for (dependency, range) in &self.dependencies {
            if dependency.trim().is_empty() {
                return Err(invalid("dependencies", "dependency name is empty"));
            }
            if range.trim().is_empty() {
                return Err(invalid(
                    "dependencies",
                    &format!("version range of '{dependency}' is empty"),
                ));
            }
            if !is_valid_name(dependency) {
                return Err(invalid(
                    "dependencies",
                    &format!("'{dependency}' is not a valid plugin name"),
                ));
            }
        }

        Ok(())
    }

    /// Display name if set and non-blank, otherwise the unique name.
    pub fn effective_display_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(display) if !display.trim().is_empty() => display,
            _ => &self.name,
        }
    }
}

/// Whether `name` is a valid reverse-domain plugin name.
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_PATTERN_INPUT && NAME_PATTERN.is_match(name)
}

/// Whether `version` is a valid semantic version string.
pub fn is_valid_version(version: &str) -> bool {
    version.len() <= MAX_PATTERN_INPUT && VERSION_PATTERN.is_match(version)
}

fn require(field: &str, value: &str) -> Result<(), ManifestError> {
    if value.trim().is_empty() {
        return Err(ManifestError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ManifestError {
    ManifestError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
