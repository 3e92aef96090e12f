//! Contracts shared between the host and plugin libraries.

pub mod plugin;

pub use plugin::{
    Capability, DockPlugin, LogLevel, PluginHost, SettingsUiDescriptor, TabContribution,
    ToolDescriptor, ToolError, ToolParameter, ToolParams,
};
