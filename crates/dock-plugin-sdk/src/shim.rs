//! Library side of the C ABI: wraps a [`DockPlugin`] behind an
//! [`FfiPluginHandle`].
//!
//! Every call is guarded by `catch_unwind`. A panic is reported to the
//! host as an error response with `panicked: true`, never unwound across
//! the boundary.

use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use tracing::warn;

use dock_core::ffi::abi::{ABI_VERSION, FfiHostApi, FfiPluginHandle};
use dock_core::ffi::protocol::{PluginRequest, PluginResponse};
use dock_core::traits::DockPlugin;

use crate::host::FfiHost;

/// Constructor registered for one entry class.
pub type PluginConstructor = fn() -> Box<dyn DockPlugin>;

const FALLBACK_RESPONSE: &str =
    r#"{"status":"error","message":"failed to encode plugin response","panicked":false}"#;

struct PluginCell {
    plugin: Box<dyn DockPlugin>,
    host: FfiHostApi,
}

impl PluginCell {
    fn handle(&mut self, request: PluginRequest) -> PluginResponse {
        match request {
            PluginRequest::Capabilities => PluginResponse::Capabilities {
                capabilities: self.plugin.capabilities(),
            },
            PluginRequest::Initialize => {
                let host = Arc::new(FfiHost::new(self.host));
                hook_response(self.plugin.initialize(host))
            }
            PluginRequest::OnInit => hook_response(self.plugin.on_init()),
            PluginRequest::OnAllPluginsLoaded => hook_response(self.plugin.on_all_plugins_loaded()),
            PluginRequest::OnEnable => hook_response(self.plugin.on_enable()),
            PluginRequest::OnDisable => hook_response(self.plugin.on_disable()),
            PluginRequest::OnDestroy => hook_response(self.plugin.on_destroy()),
            PluginRequest::InvokeTool { tool, params } => {
                match self.plugin.invoke_tool(&tool, &params) {
                    Ok(output) => PluginResponse::ToolResult { output },
                    Err(error) => PluginResponse::ToolError { error },
                }
            }
        }
    }
}

fn hook_response(result: anyhow::Result<()>) -> PluginResponse {
    match result {
        Ok(()) => PluginResponse::Ok,
        Err(e) => PluginResponse::Error {
            message: format!("{e:#}"),
            panicked: false,
        },
    }
}

fn failure(message: impl Into<String>) -> PluginResponse {
    PluginResponse::Error {
        message: message.into(),
        panicked: false,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn into_raw(response: &PluginResponse) -> *mut c_char {
    let json = serde_json::to_string(response).unwrap_or_else(|_| FALLBACK_RESPONSE.to_string());
    CString::new(json)
        .or_else(|_| CString::new(FALLBACK_RESPONSE))
        .map_or(ptr::null_mut(), CString::into_raw)
}

/// Build the handle for `entry_class`. Called from the function generated
/// by [`export_plugin!`](crate::export_plugin).
///
/// The returned instance is null when the entry class is unknown or its
/// constructor panicked.
///
/// # Safety
///
/// `entry_class` must be null or a valid NUL-terminated string.
pub unsafe fn create_plugin(
    entry_class: *const c_char,
    host: FfiHostApi,
    constructors: &[(&str, PluginConstructor)],
) -> FfiPluginHandle {
    let class = if entry_class.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(entry_class) }.to_str().ok()
    };

    let plugin = class
        .and_then(|class| constructors.iter().find(|(name, _)| *name == class))
        .and_then(|(_, construct)| panic::catch_unwind(*construct).ok());

    let instance = match plugin {
        Some(plugin) => Box::into_raw(Box::new(PluginCell { plugin, host })) as *mut c_void,
        None => {
            warn!(entry_class = ?class, "No plugin constructed for entry class");
            ptr::null_mut()
        }
    };

    FfiPluginHandle {
        abi_version: ABI_VERSION,
        instance,
        call: plugin_call,
        free_string: plugin_free_string,
        destroy: plugin_destroy,
    }
}

unsafe extern "C" fn plugin_call(instance: *mut c_void, request_json: *const c_char) -> *mut c_char {
    if instance.is_null() {
        return into_raw(&failure("plugin instance is null"));
    }
    let cell = unsafe { &mut *(instance as *mut PluginCell) };

    let request = if request_json.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(request_json) }.to_str().ok()
    };
    let response = match request.map(serde_json::from_str::<PluginRequest>) {
        Some(Ok(request)) => panic::catch_unwind(AssertUnwindSafe(|| cell.handle(request)))
            .unwrap_or_else(|payload| PluginResponse::Error {
                message: panic_message(payload.as_ref()),
                panicked: true,
            }),
        Some(Err(e)) => failure(format!("invalid plugin request: {e}")),
        None => failure("plugin request is not a UTF-8 string"),
    };
    into_raw(&response)
}

unsafe extern "C" fn plugin_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

unsafe extern "C" fn plugin_destroy(instance: *mut c_void) {
    if instance.is_null() {
        return;
    }
    let cell = unsafe { Box::from_raw(instance as *mut PluginCell) };
    if panic::catch_unwind(AssertUnwindSafe(move || drop(cell))).is_err() {
        warn!("Plugin panicked while being dropped");
    }
}
