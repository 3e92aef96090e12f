//! Plugin instantiation behind an isolated load context.
//!
//! A [`PluginLoader`] turns a binary path and entry class into a
//! [`LoadContext`]. With the `dynamic` feature, [`DynamicLibraryLoader`]
//! opens one library per plugin; [`StaticPluginLoader`] builds plugins
//! compiled into the host.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use dock_core::traits::DockPlugin;

use crate::error::{LoadError, panic_message};

/// What to load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Unique plugin name, for logging.
    pub plugin_name: &'a str,
    /// Absolute path of the plugin library.
    pub binary_path: &'a Path,
    /// Entry class from the manifest.
    pub entry_class: &'a str,
}

/// An isolated plugin boundary: the plugin object and the library that
/// provides its code.
///
/// Dropping the context destroys the plugin object first and then closes
/// the library. The OS may keep the library mapped while a leaked
/// reference into it remains.
pub struct LoadContext {
    plugin: Option<Box<dyn DockPlugin>>,
    #[cfg(feature = "dynamic")]
    library: Option<libloading::Library>,
}

impl LoadContext {
    /// Context for a plugin with no separate library.
    pub fn in_process(plugin: Box<dyn DockPlugin>) -> Self {
        Self {
            plugin: Some(plugin),
            #[cfg(feature = "dynamic")]
            library: None,
        }
    }

    /// Context owning a dynamically loaded library.
    #[cfg(feature = "dynamic")]
    pub fn with_library(plugin: Box<dyn DockPlugin>, library: libloading::Library) -> Self {
        Self {
            plugin: Some(plugin),
            library: Some(library),
        }
    }

    /// The plugin object, until [`unload`](Self::unload) is called.
    pub fn plugin(&self) -> Option<&dyn DockPlugin> {
        self.plugin.as_deref()
    }

    /// Mutable access to the plugin object.
    pub fn plugin_mut(&mut self) -> Option<&mut (dyn DockPlugin + 'static)> {
        self.plugin.as_deref_mut()
    }

    /// Whether the plugin object is still alive.
    pub fn is_loaded(&self) -> bool {
        self.plugin.is_some()
    }

    /// Destroy the plugin object, then close the library. Idempotent.
    pub fn unload(&mut self) {
        if let Some(plugin) = self.plugin.take() {
            // Destructors run plugin code.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(plugin))) {
                tracing::warn!(
                    error = %panic_message(payload.as_ref()),
                    "Plugin object panicked while dropping"
                );
            }
        }
        self.close_library();
    }

    #[cfg(feature = "dynamic")]
    fn close_library(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(e) = library.close() {
                tracing::warn!(error = %e, "Failed to close plugin library");
            }
        }
    }

    #[cfg(not(feature = "dynamic"))]
    fn close_library(&mut self) {}
}

impl Drop for LoadContext {
    fn drop(&mut self) {
        self.unload();
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("LoadContext");
        s.field("loaded", &self.is_loaded());
        #[cfg(feature = "dynamic")]
        s.field("library", &self.library.is_some());
        s.finish()
    }
}

/// Creates plugin objects from binaries.
pub trait PluginLoader: Send + Sync {
    /// Open the binary and instantiate the entry class.
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadContext, LoadError>;
}

/// Factory for a built-in plugin type.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn DockPlugin> + Send + Sync>;

/// Loader for plugins compiled into the host.
///
/// The binary named by the manifest must still exist in the plugin folder;
/// its contents are not read.
#[derive(Clone, Default)]
pub struct StaticPluginLoader {
    factories: HashMap<String, PluginFactory>,
}

impl StaticPluginLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an entry class name.
    pub fn register<F>(&mut self, entry_class: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn DockPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(entry_class.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, entry_class: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn DockPlugin> + Send + Sync + 'static,
    {
        self.register(entry_class, factory);
        self
    }
}

impl PluginLoader for StaticPluginLoader {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadContext, LoadError> {
        if !request.binary_path.is_file() {
            return Err(LoadError::BinaryNotFound {
                path: request.binary_path.to_path_buf(),
            });
        }
        let factory =
            self.factories
                .get(request.entry_class)
                .ok_or_else(|| LoadError::EntryClassNotFound {
                    entry_class: request.entry_class.to_string(),
                })?;

        let plugin = panic::catch_unwind(AssertUnwindSafe(|| factory())).map_err(|payload| {
            LoadError::Instantiation {
                reason: panic_message(payload.as_ref()),
            }
        })?;
        Ok(LoadContext::in_process(plugin))
    }
}

impl std::fmt::Debug for StaticPluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<&String> = self.factories.keys().collect();
        classes.sort();
        f.debug_struct("StaticPluginLoader")
            .field("entry_classes", &classes)
            .finish()
    }
}

#[cfg(feature = "dynamic")]
pub use dynamic_loader::DynamicLibraryLoader;

#[cfg(feature = "dynamic")]
mod dynamic_loader {
    use tracing::{info, warn};

    use dock_core::ffi::abi::{ABI_VERSION, FfiPluginCreateFn, PLUGIN_CREATE_SYMBOL};

    use crate::error::LoadError;
    use crate::ffi::safety::string_to_c_string;
    use crate::ffi::{FfiPlugin, HostSlot};

    use super::{LoadContext, LoadRequest, PluginLoader};

    /// Loads plugins from shared libraries (.so / .dll / .dylib).
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DynamicLibraryLoader;

    impl DynamicLibraryLoader {
        /// Create a loader.
        pub fn new() -> Self {
            Self
        }
    }

    impl PluginLoader for DynamicLibraryLoader {
        fn load(&self, request: &LoadRequest<'_>) -> Result<LoadContext, LoadError> {
            let path = request.binary_path;
            if !path.is_file() {
                return Err(LoadError::BinaryNotFound {
                    path: path.to_path_buf(),
                });
            }

            // SAFETY: loading a library runs its initializers. Plugins are
            // trusted not to be malicious.
            let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
                LoadError::Library {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;

            let create: FfiPluginCreateFn = unsafe {
                let symbol = library
                    .get::<FfiPluginCreateFn>(PLUGIN_CREATE_SYMBOL)
                    .map_err(|_| LoadError::MissingSymbol {
                        path: path.to_path_buf(),
                        symbol: "dock_plugin_create".to_string(),
                    })?;
                *symbol
            };

            let entry_class = string_to_c_string(request.entry_class).ok_or_else(|| {
                LoadError::EntryClassNotFound {
                    entry_class: request.entry_class.to_string(),
                }
            })?;
            let host_slot = Box::new(HostSlot::new());
            let handle = unsafe { create(entry_class.as_ptr(), host_slot.api()) };

            if handle.abi_version != ABI_VERSION {
                // The handle layout cannot be trusted; leak the object.
                warn!(
                    plugin = %request.plugin_name,
                    found = handle.abi_version,
                    "Plugin built against another ABI"
                );
                return Err(LoadError::AbiMismatch {
                    expected: ABI_VERSION,
                    found: handle.abi_version,
                });
            }
            if handle.instance.is_null() {
                return Err(LoadError::EntryClassNotFound {
                    entry_class: request.entry_class.to_string(),
                });
            }

            info!(
                plugin = %request.plugin_name,
                path = %path.display(),
                "Plugin library loaded"
            );

            let plugin = FfiPlugin::new(handle, host_slot);
            Ok(LoadContext::with_library(Box::new(plugin), library))
        }
    }
}
