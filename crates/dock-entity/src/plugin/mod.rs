//! Installed plugin records.

pub mod model;

pub use model::{CreatePluginRecord, PluginRecord};
