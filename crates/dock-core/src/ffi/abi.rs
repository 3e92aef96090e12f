//! FFI ABI definitions for dynamic plugins.
//!
//! A plugin library exports one symbol, [`PLUGIN_CREATE_SYMBOL`], with the
//! signature [`FfiPluginCreateFn`]. The host passes the requested entry
//! class and an [`FfiHostApi`]; the plugin returns an [`FfiPluginHandle`]
//! whose `instance` is null when the entry class is unknown.
//!
//! Strings returned by either side are owned by that side and must be
//! released through the matching `free_string` function.

use std::os::raw::{c_char, c_void};

/// ABI revision. Bumped on any incompatible change to the structs below.
pub const ABI_VERSION: u32 = 1;

/// Name of the factory symbol every plugin library exports.
pub const PLUGIN_CREATE_SYMBOL: &[u8] = b"dock_plugin_create\0";

/// Host callbacks handed to a plugin at creation time.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiHostApi {
    /// Opaque host context, passed back on every call.
    pub ctx: *const c_void,
    /// Execute a JSON-encoded `HostRequest`, returning a JSON `HostResponse`.
    pub call: unsafe extern "C" fn(ctx: *const c_void, request_json: *const c_char) -> *mut c_char,
    /// Release a string returned by `call`.
    pub free_string: unsafe extern "C" fn(ptr: *mut c_char),
}

/// Plugin object handle returned by the factory.
#[repr(C)]
pub struct FfiPluginHandle {
    /// ABI revision the plugin was built against.
    pub abi_version: u32,
    /// Opaque plugin object; null if the entry class was not found.
    pub instance: *mut c_void,
    /// Execute a JSON-encoded `PluginRequest`, returning a JSON `PluginResponse`.
    pub call: unsafe extern "C" fn(instance: *mut c_void, request_json: *const c_char) -> *mut c_char,
    /// Release a string returned by `call`.
    pub free_string: unsafe extern "C" fn(ptr: *mut c_char),
    /// Destroy the plugin object. Must be called exactly once.
    pub destroy: unsafe extern "C" fn(instance: *mut c_void),
}

/// Type signature of the exported factory.
///
/// Plugin libraries export:
/// ```c
/// FfiPluginHandle dock_plugin_create(const char* entry_class, FfiHostApi host);
/// ```
pub type FfiPluginCreateFn =
    unsafe extern "C" fn(entry_class: *const c_char, host: FfiHostApi) -> FfiPluginHandle;
