//! Prelude for convenient imports.

pub use crate::api::DockPluginHost;
pub use crate::context::DockContext;
pub use crate::error::{DependencyError, HookError, LoadError, ManifestError, PackageError};
pub use crate::instance::{InstanceState, PluginInstance};
pub use crate::loader::{LoadContext, PluginLoader, StaticPluginLoader};
pub use crate::manager::PluginManager;
pub use crate::manifest::PluginManifest;
pub use crate::outcome::{InstallOutcome, OperationOutcome, ToolOutcome};
pub use crate::registry::PluginInfo;

#[cfg(feature = "dynamic")]
pub use crate::loader::DynamicLibraryLoader;
