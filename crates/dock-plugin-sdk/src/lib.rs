//! # dock-plugin-sdk
//!
//! SDK for developing dock plugins as dynamic libraries.
//!
//! A plugin crate is built as a `cdylib`, implements
//! [`DockPlugin`](dock_core::traits::DockPlugin) for one or more types and
//! exports them by entry class with [`export_plugin!`]:
//!
//! ```rust,ignore
//! use dock_plugin_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct Notes {
//!     host: Option<Arc<dyn PluginHost>>,
//! }
//!
//! impl DockPlugin for Notes {
//!     fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
//!         host.log(LogLevel::Info, "notes ready");
//!         self.host = Some(host);
//!         Ok(())
//!     }
//! }
//!
//! export_plugin! {
//!     "Notes" => Notes::default(),
//! }
//! ```
//!
//! The library's `plugin.json` names the entry class in `entryClass`.

pub mod host;
pub mod macros;
pub mod shim;

pub use dock_core::ffi::{abi, protocol};

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use dock_core::error::{AppError, ErrorKind};
    pub use dock_core::result::AppResult;
    pub use dock_core::traits::{
        Capability, DockPlugin, LogLevel, PluginHost, SettingsUiDescriptor, TabContribution,
        ToolDescriptor, ToolError, ToolParameter, ToolParams,
    };

    pub use crate::export_plugin;
    pub use crate::host::FfiHost;
}
