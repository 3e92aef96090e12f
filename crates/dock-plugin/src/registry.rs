//! Plugin registry: loaded instances keyed by unique name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use dock_core::traits::Capability;
use dock_entity::plugin::PluginRecord;

use crate::instance::{InstanceState, PluginInstance, SharedInstance};

/// Snapshot of one plugin for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Id of the current load.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Reverse-domain unique name.
    pub unique_name: String,
    /// Manifest version.
    pub version: String,
    /// Manifest description.
    pub description: Option<String>,
    /// Manifest author.
    pub author: Option<String>,
    /// Library path.
    pub binary_path: PathBuf,
    /// Lifecycle state.
    pub state: InstanceState,
    /// Last failure.
    pub error_message: Option<String>,
    /// When the instance was created.
    pub loaded_at: DateTime<Utc>,
    /// Declared capabilities.
    pub capabilities: Vec<Capability>,
    /// Marked for removal at next startup.
    pub pending_delete: bool,
    /// An update is staged for next startup.
    pub pending_update: bool,
    /// Version of the staged update.
    pub pending_version: Option<String>,
}

impl PluginInfo {
    /// Snapshot an instance, merging flags from its record.
    pub fn new(instance: &PluginInstance, record: Option<&PluginRecord>) -> Self {
        Self {
            id: instance.id,
            name: instance.name.clone(),
            unique_name: instance.unique_name.clone(),
            version: instance.manifest.version.clone(),
            description: instance.manifest.description.clone(),
            author: instance.manifest.author.clone(),
            binary_path: instance.binary_path.clone(),
            state: instance.state(),
            error_message: instance.error_message.clone(),
            loaded_at: instance.loaded_at,
            capabilities: instance.capabilities().to_vec(),
            pending_delete: record.is_some_and(|r| r.pending_delete),
            pending_update: record.is_some_and(|r| r.pending_update),
            pending_version: record.and_then(|r| r.pending_version.clone()),
        }
    }
}

/// Registry of all loaded plugin instances.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Unique name → instance.
    plugins: RwLock<HashMap<String, SharedInstance>>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance, replacing and returning any previous one.
    pub async fn insert(&self, instance: PluginInstance) -> Option<SharedInstance> {
        let name = instance.unique_name.clone();
        info!(plugin = %name, state = %instance.state(), "Registering plugin");
        let mut plugins = self.plugins.write().await;
        plugins.insert(name, Arc::new(Mutex::new(instance)))
    }

    /// Unregisters an instance.
    pub async fn remove(&self, name: &str) -> Option<SharedInstance> {
        let removed = self.plugins.write().await.remove(name);
        if removed.is_some() {
            info!(plugin = %name, "Plugin unregistered");
        }
        removed
    }

    /// Gets an instance by unique name.
    pub async fn get(&self, name: &str) -> Option<SharedInstance> {
        self.plugins.read().await.get(name).cloned()
    }

    /// Whether a name is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.plugins.read().await.contains_key(name)
    }

    /// Every registered instance, sorted by name.
    pub async fn all(&self) -> Vec<(String, SharedInstance)> {
        let plugins = self.plugins.read().await;
        let mut all: Vec<(String, SharedInstance)> = plugins
            .iter()
            .map(|(name, instance)| (name.clone(), instance.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Removes and returns every instance.
    pub async fn drain(&self) -> Vec<(String, SharedInstance)> {
        let mut plugins = self.plugins.write().await;
        let mut all: Vec<(String, SharedInstance)> = plugins.drain().collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Number of registered instances.
    pub async fn len(&self) -> usize {
        self.plugins.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.plugins.read().await.is_empty()
    }
}
