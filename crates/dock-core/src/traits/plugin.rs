//! Plugin contract.
//!
//! A plugin exposes a [`DockPlugin`] object to the host and receives a
//! [`PluginHost`] handle in return. Everything a plugin can do to host
//! state goes through the host handle, scoped to the plugin's own name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::AppResult;

/// Parameters passed to a tool invocation.
pub type ToolParams = HashMap<String, String>;

/// A navigation tab contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabContribution {
    /// Stable class name of the tab. Combined with the owning plugin's
    /// name it forms the navigation tab id.
    pub tab_class: String,
    /// Label shown in the navigation bar.
    pub display_name: String,
    /// Icon identifier resolved by the UI.
    pub icon: String,
}

/// Describes a plugin-provided settings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUiDescriptor {
    /// Page title.
    pub title: String,
    /// Optional description shown under the title.
    #[serde(default)]
    pub description: Option<String>,
}

/// A single parameter accepted by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether the caller must supply the parameter.
    #[serde(default)]
    pub required: bool,
}

/// A tool a plugin can execute on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within the plugin.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Accepted parameters.
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

/// A capability a plugin declares when it is loaded.
///
/// Read once at load time; the host never probes the plugin object for
/// optional surfaces afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Capability {
    /// The plugin contributes navigation tabs.
    Tabs(Vec<TabContribution>),
    /// The plugin provides a settings page.
    SettingsUi(SettingsUiDescriptor),
    /// The plugin exposes invocable tools.
    Tools(Vec<ToolDescriptor>),
}

/// Error payload returned from a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ToolError {
    /// The plugin does not expose a tool with this name.
    #[error("unknown tool '{tool}'")]
    UnknownTool {
        /// Requested tool name.
        tool: String,
    },
    /// A parameter was missing or malformed.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The tool ran and failed.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
    },
    /// The target plugin is missing, disabled, or has no tools.
    #[error("plugin unavailable: {reason}")]
    Unavailable {
        /// Why the call could not be routed.
        reason: String,
    },
    /// The plugin panicked while running the tool.
    #[error("plugin panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
}

/// Severity of a log line emitted by a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Host services available to a plugin.
///
/// Every key-value, settings and image call is scoped to the plugin the
/// handle was issued to. Calls are synchronous; plugins are always invoked
/// from a blocking worker thread, never from the async executor.
pub trait PluginHost: Send + Sync {
    /// Unique name of the plugin this handle belongs to.
    fn plugin_name(&self) -> String;

    /// Emit a log line attributed to the plugin.
    fn log(&self, level: LogLevel, message: &str);

    /// Read a key-value entry.
    fn get_value(&self, key: &str) -> AppResult<Option<String>>;
    /// Insert or overwrite a key-value entry.
    fn set_value(&self, key: &str, value: &str) -> AppResult<()>;
    /// Delete a key-value entry.
    fn delete_value(&self, key: &str) -> AppResult<()>;
    /// List all key-value keys.
    fn value_keys(&self) -> AppResult<Vec<String>>;

    /// Read a setting.
    fn get_setting(&self, key: &str) -> AppResult<Option<String>>;
    /// Insert or overwrite a setting. The description defaults to the key.
    fn set_setting(&self, key: &str, value: &str, description: Option<&str>) -> AppResult<()>;
    /// Delete a setting.
    fn delete_setting(&self, key: &str) -> AppResult<()>;
    /// List all setting keys.
    fn setting_keys(&self) -> AppResult<Vec<String>>;

    /// Store an image under a plugin-local key, replacing any previous data.
    fn save_image(&self, key: &str, data: &[u8]) -> AppResult<()>;
    /// Load an image by key.
    fn load_image(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
    /// Delete an image by key.
    fn delete_image(&self, key: &str) -> AppResult<()>;

    /// Read a key-value entry of a declared dependency.
    fn dependency_value(&self, dependency: &str, key: &str) -> AppResult<Option<String>>;
    /// List key-value keys of a declared dependency.
    fn dependency_value_keys(&self, dependency: &str) -> AppResult<Vec<String>>;
    /// Read a setting of a declared dependency.
    fn dependency_setting(&self, dependency: &str, key: &str) -> AppResult<Option<String>>;
    /// List setting keys of a declared dependency.
    fn dependency_setting_keys(&self, dependency: &str) -> AppResult<Vec<String>>;

    /// Directory for plugin configuration files.
    fn config_directory(&self) -> PathBuf;
    /// Directory for plugin data files. Preserved across updates.
    fn data_directory(&self) -> PathBuf;
}

/// The object a plugin library hands to the host.
///
/// Hooks return `anyhow::Result` so plugin authors can use `?` freely; the
/// host converts failures and panics into logged hook errors and never
/// lets them abort a lifecycle transition.
pub trait DockPlugin: Send {
    /// Capabilities exposed by this plugin.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Receive the host handle. Called once, before `on_init`.
    fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()>;

    /// Called after `initialize`.
    fn on_init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when every plugin from the current scan has been loaded.
    fn on_all_plugins_loaded(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the plugin is enabled.
    fn on_enable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the plugin is disabled.
    fn on_disable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once before the plugin object is dropped.
    fn on_destroy(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run a tool by name.
    fn invoke_tool(&mut self, tool: &str, _params: &ToolParams) -> Result<String, ToolError> {
        Err(ToolError::UnknownTool {
            tool: tool.to_string(),
        })
    }
}
