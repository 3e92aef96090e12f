//! A loaded plugin and its lifecycle state machine.
//!
//! ```text
//! Unloaded -> Loaded -> Initialized -> Enabled <-> Disabled -> Unloaded
//! ```
//!
//! Every call into plugin code is guarded: errors and panics become
//! [`HookError`] values carrying the plugin name, and the instance keeps
//! its last failure in `error_message`. Nothing unwinds into the host.
//!
//! Methods here are synchronous and run plugin code on the calling thread.
//! From async code use [`with_instance`], which moves the call onto the
//! blocking pool.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dock_core::error::AppError;
use dock_core::result::AppResult;
use dock_core::traits::{
    Capability, DockPlugin, PluginHost, TabContribution, ToolDescriptor, ToolError, ToolParams,
};

use crate::error::{HookError, LoadError, panic_message};
use crate::loader::{LoadContext, LoadRequest, PluginLoader};
use crate::manifest::PluginManifest;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// No plugin object. Initial state of a failed load and terminal state
    /// after dispose.
    Unloaded,
    /// Plugin object created.
    Loaded,
    /// Host handed over and init hook run.
    Initialized,
    /// Running.
    Enabled,
    /// Stopped, may be enabled again.
    Disabled,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Initialized => "initialized",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Shared handle to an instance.
pub type SharedInstance = Arc<Mutex<PluginInstance>>;

/// Run `f` against an instance on the blocking pool.
pub async fn with_instance<R, F>(instance: SharedInstance, f: F) -> AppResult<R>
where
    R: Send + 'static,
    F: FnOnce(&mut PluginInstance) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = instance.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    })
    .await
    .map_err(|e| AppError::internal(format!("Plugin task failed: {e}")))
}

/// A plugin object together with its identity and load context.
pub struct PluginInstance {
    /// Unique id of this load.
    pub id: Uuid,
    /// Effective display name.
    pub name: String,
    /// Reverse-domain unique name.
    pub unique_name: String,
    /// Plugin folder.
    pub plugin_dir: PathBuf,
    /// Absolute library path.
    pub binary_path: PathBuf,
    /// Parsed manifest.
    pub manifest: PluginManifest,
    /// When the instance was created.
    pub loaded_at: DateTime<Utc>,
    /// Last load or hook failure.
    pub error_message: Option<String>,
    state: InstanceState,
    context: Option<LoadContext>,
    capabilities: Vec<Capability>,
    disposed: bool,
}

impl PluginInstance {
    /// Open the plugin's load context and create the plugin object.
    /// Capabilities are read once here.
    pub fn load(
        manifest: PluginManifest,
        plugin_dir: &Path,
        loader: &dyn PluginLoader,
    ) -> Result<Self, LoadError> {
        let binary_path = plugin_dir.join(&manifest.main);
        let context = loader.load(&LoadRequest {
            plugin_name: &manifest.name,
            binary_path: &binary_path,
            entry_class: &manifest.entry_class,
        })?;

        let capabilities = context
            .plugin()
            .map(|plugin| panic::catch_unwind(AssertUnwindSafe(|| plugin.capabilities())))
            .transpose()
            .map_err(|payload| LoadError::Instantiation {
                reason: format!(
                    "capability query panicked: {}",
                    panic_message(payload.as_ref())
                ),
            })?
            .unwrap_or_default();

        info!(
            plugin = %manifest.name,
            version = %manifest.version,
            capabilities = capabilities.len(),
            "Plugin loaded"
        );

        Ok(Self {
            id: Uuid::new_v4(),
            name: manifest.effective_display_name().to_string(),
            unique_name: manifest.name.clone(),
            plugin_dir: plugin_dir.to_path_buf(),
            binary_path,
            manifest,
            loaded_at: Utc::now(),
            error_message: None,
            state: InstanceState::Loaded,
            context: Some(context),
            capabilities,
            disposed: false,
        })
    }

    /// An instance with no plugin object, kept so the failure stays visible.
    pub fn failed(manifest: PluginManifest, plugin_dir: &Path, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: manifest.effective_display_name().to_string(),
            unique_name: manifest.name.clone(),
            plugin_dir: plugin_dir.to_path_buf(),
            binary_path: plugin_dir.join(&manifest.main),
            manifest,
            loaded_at: Utc::now(),
            error_message: Some(message.into()),
            state: InstanceState::Unloaded,
            context: None,
            capabilities: Vec::new(),
            disposed: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Whether the plugin object exists.
    pub fn is_loaded(&self) -> bool {
        self.context.as_ref().is_some_and(LoadContext::is_loaded)
    }

    /// Whether initialization completed.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            InstanceState::Initialized | InstanceState::Enabled | InstanceState::Disabled
        )
    }

    /// Whether the plugin is running.
    pub fn is_enabled(&self) -> bool {
        self.state == InstanceState::Enabled
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Navigation tabs the plugin contributes.
    pub fn tabs(&self) -> impl Iterator<Item = &TabContribution> {
        self.capabilities.iter().flat_map(|c| match c {
            Capability::Tabs(tabs) => tabs.as_slice(),
            _ => &[],
        })
    }

    /// Tools the plugin offers.
    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.capabilities.iter().flat_map(|c| match c {
            Capability::Tools(tools) => tools.as_slice(),
            _ => &[],
        })
    }

    /// Hand the plugin its host and run the init hook.
    pub fn initialize(&mut self, host: Arc<dyn PluginHost>) -> Result<(), HookError> {
        self.expect_state("initialize", &[InstanceState::Loaded])?;
        self.run_hook("initialize", move |plugin| plugin.initialize(host))?;
        self.run_hook("on_init", |plugin| plugin.on_init())?;
        self.state = InstanceState::Initialized;
        debug!(plugin = %self.unique_name, "Plugin initialized");
        Ok(())
    }

    /// Notify the plugin that every plugin of the current scan is loaded.
    pub fn on_all_plugins_loaded(&mut self) -> Result<(), HookError> {
        if !self.is_initialized() {
            return Err(self.invalid_state("on_all_plugins_loaded"));
        }
        self.run_hook("on_all_plugins_loaded", |plugin| plugin.on_all_plugins_loaded())
    }

    /// Start the plugin. A no-op when already enabled. The instance ends
    /// up enabled even if the hook fails; the failure is returned and kept
    /// as the error message.
    pub fn enable(&mut self) -> Result<(), HookError> {
        if self.state == InstanceState::Enabled {
            return Ok(());
        }
        self.expect_state(
            "on_enable",
            &[
                InstanceState::Loaded,
                InstanceState::Initialized,
                InstanceState::Disabled,
            ],
        )?;
        let result = self.run_hook("on_enable", |plugin| plugin.on_enable());
        if result.is_ok() {
            self.error_message = None;
        }
        self.state = InstanceState::Enabled;
        info!(plugin = %self.unique_name, "Plugin enabled");
        result
    }

    /// Stop the plugin. A no-op unless enabled. The instance ends up
    /// disabled even if the hook fails.
    pub fn disable(&mut self) -> Result<(), HookError> {
        if self.state != InstanceState::Enabled {
            return Ok(());
        }
        let result = self.run_hook("on_disable", |plugin| plugin.on_disable());
        self.state = InstanceState::Disabled;
        info!(plugin = %self.unique_name, "Plugin disabled");
        result
    }

    /// Disable if needed, run the destroy hook, drop the plugin object and
    /// unload its boundary. Safe to call more than once; returns the hook
    /// failures of the first call.
    pub fn dispose(&mut self) -> Vec<HookError> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;

        let mut failures = Vec::new();
        if let Err(e) = self.disable() {
            failures.push(e);
        }
        if self.is_loaded() {
            if let Err(e) = self.run_hook("on_destroy", |plugin| plugin.on_destroy()) {
                failures.push(e);
            }
        }
        if let Some(mut context) = self.context.take() {
            context.unload();
        }
        self.state = InstanceState::Unloaded;
        info!(plugin = %self.unique_name, failures = failures.len(), "Plugin disposed");
        failures
    }

    /// Run a tool. Requires the plugin to be enabled and to declare it.
    pub fn invoke_tool(&mut self, tool: &str, params: &ToolParams) -> Result<String, ToolError> {
        if self.state != InstanceState::Enabled {
            return Err(ToolError::Unavailable {
                reason: format!("plugin '{}' is {}", self.unique_name, self.state),
            });
        }
        let Some(descriptor) = self.tools().find(|t| t.name == tool) else {
            return Err(ToolError::UnknownTool {
                tool: tool.to_string(),
            });
        };
        if let Some(missing) = descriptor
            .parameters
            .iter()
            .find(|p| p.required && !params.contains_key(&p.name))
        {
            return Err(ToolError::InvalidParameter {
                name: missing.name.clone(),
                reason: "required parameter is missing".to_string(),
            });
        }

        let Some(plugin) = self.context.as_mut().and_then(LoadContext::plugin_mut) else {
            return Err(ToolError::Unavailable {
                reason: format!("plugin '{}' is not loaded", self.unique_name),
            });
        };
        match panic::catch_unwind(AssertUnwindSafe(|| plugin.invoke_tool(tool, params))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(plugin = %self.unique_name, tool = %tool, error = %message, "Tool panicked");
                Err(ToolError::Panicked { message })
            }
        }
    }

    fn run_hook<F>(&mut self, hook: &'static str, f: F) -> Result<(), HookError>
    where
        F: FnOnce(&mut (dyn DockPlugin + 'static)) -> anyhow::Result<()>,
    {
        let Some(plugin) = self.context.as_mut().and_then(LoadContext::plugin_mut) else {
            return Err(self.invalid_state(hook));
        };

        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(plugin))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HookError::Failed {
                plugin: self.unique_name.clone(),
                hook,
                message: format!("{e:#}"),
            }),
            Err(payload) => Err(HookError::Panicked {
                plugin: self.unique_name.clone(),
                hook,
                message: panic_message(payload.as_ref()),
            }),
        };

        if let Err(e) = &result {
            warn!(plugin = %self.unique_name, hook = hook, error = %e, "Plugin hook failed");
            self.error_message = Some(e.to_string());
        }
        result
    }

    fn expect_state(&self, hook: &'static str, allowed: &[InstanceState]) -> Result<(), HookError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid_state(hook))
        }
    }

    fn invalid_state(&self, hook: &'static str) -> HookError {
        HookError::InvalidState {
            plugin: self.unique_name.clone(),
            hook,
            state: self.state,
        }
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        if !self.disposed {
            self.dispose();
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.id)
            .field("unique_name", &self.unique_name)
            .field("state", &self.state)
            .field("error_message", &self.error_message)
            .finish()
    }
}
