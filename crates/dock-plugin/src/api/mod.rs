//! Host API handed to plugin instances.

pub mod host;

pub use host::DockPluginHost;
