//! [`DockPlugin`] implementation backed by a plugin library handle.
//!
//! Every trait call becomes one JSON `PluginRequest`. A plugin-side panic
//! is reported by the library as an error with `panicked: true` and is
//! re-raised here with `resume_unwind`, so callers see the same failure
//! shape as for an in-process plugin.

use std::panic;
use std::sync::Arc;

use tracing::warn;

use dock_core::ffi::abi::FfiPluginHandle;
use dock_core::ffi::protocol::{PluginRequest, PluginResponse};
use dock_core::traits::{Capability, DockPlugin, PluginHost, ToolError, ToolParams};

use super::host_bridge::HostSlot;
use super::safety::{c_str_to_string, string_to_c_string};

/// A plugin object living on the far side of the C ABI.
pub struct FfiPlugin {
    handle: FfiPluginHandle,
    host_slot: Box<HostSlot>,
    destroyed: bool,
}

// The handle is only used through `&mut self`, one call at a time.
unsafe impl Send for FfiPlugin {}

impl FfiPlugin {
    /// Wrap a handle returned by the library factory. `host_slot` must be
    /// the slot whose [`HostSlot::api`] was passed to the factory.
    pub fn new(handle: FfiPluginHandle, host_slot: Box<HostSlot>) -> Self {
        Self {
            handle,
            host_slot,
            destroyed: false,
        }
    }

    fn request(&self, request: &PluginRequest) -> Result<PluginResponse, String> {
        if self.destroyed {
            return Err("plugin object has been destroyed".to_string());
        }
        let json = serde_json::to_string(request).map_err(|e| e.to_string())?;
        let json = string_to_c_string(&json).ok_or("request contains NUL bytes")?;

        let raw = unsafe { (self.handle.call)(self.handle.instance, json.as_ptr()) };
        if raw.is_null() {
            return Err("plugin returned no response".to_string());
        }
        let text = c_str_to_string(raw);
        unsafe { (self.handle.free_string)(raw) };

        let text = text.ok_or("plugin response is not UTF-8")?;
        serde_json::from_str(&text).map_err(|e| format!("invalid plugin response: {e}"))
    }

    fn hook(&self, request: PluginRequest) -> anyhow::Result<()> {
        match self.request(&request).map_err(anyhow::Error::msg)? {
            PluginResponse::Ok => Ok(()),
            PluginResponse::Error { message, panicked } => {
                if panicked {
                    panic::resume_unwind(Box::new(message));
                }
                Err(anyhow::anyhow!(message))
            }
            other => Err(anyhow::anyhow!("unexpected plugin response: {other:?}")),
        }
    }
}

impl DockPlugin for FfiPlugin {
    fn capabilities(&self) -> Vec<Capability> {
        match self.request(&PluginRequest::Capabilities) {
            Ok(PluginResponse::Capabilities { capabilities }) => capabilities,
            Ok(PluginResponse::Error { message, panicked: true }) => {
                panic::resume_unwind(Box::new(message))
            }
            Ok(other) => {
                warn!(response = ?other, "Plugin did not report capabilities");
                Vec::new()
            }
            Err(reason) => {
                warn!(error = %reason, "Capability query failed");
                Vec::new()
            }
        }
    }

    fn initialize(&mut self, host: Arc<dyn PluginHost>) -> anyhow::Result<()> {
        self.host_slot.set(host);
        self.hook(PluginRequest::Initialize)
    }

    fn on_init(&mut self) -> anyhow::Result<()> {
        self.hook(PluginRequest::OnInit)
    }

    fn on_all_plugins_loaded(&mut self) -> anyhow::Result<()> {
        self.hook(PluginRequest::OnAllPluginsLoaded)
    }

    fn on_enable(&mut self) -> anyhow::Result<()> {
        self.hook(PluginRequest::OnEnable)
    }

    fn on_disable(&mut self) -> anyhow::Result<()> {
        self.hook(PluginRequest::OnDisable)
    }

    fn on_destroy(&mut self) -> anyhow::Result<()> {
        self.hook(PluginRequest::OnDestroy)
    }

    fn invoke_tool(&mut self, tool: &str, params: &ToolParams) -> Result<String, ToolError> {
        let request = PluginRequest::InvokeTool {
            tool: tool.to_string(),
            params: params.clone(),
        };
        match self.request(&request) {
            Ok(PluginResponse::ToolResult { output }) => Ok(output),
            Ok(PluginResponse::ToolError { error }) => Err(error),
            Ok(PluginResponse::Error { message, panicked }) => {
                if panicked {
                    panic::resume_unwind(Box::new(message));
                }
                Err(ToolError::Failed { message })
            }
            Ok(other) => Err(ToolError::Failed {
                message: format!("unexpected plugin response: {other:?}"),
            }),
            Err(reason) => Err(ToolError::Unavailable { reason }),
        }
    }
}

impl Drop for FfiPlugin {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            unsafe { (self.handle.destroy)(self.handle.instance) };
        }
        self.host_slot.clear();
    }
}

impl std::fmt::Debug for FfiPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfiPlugin")
            .field("abi_version", &self.handle.abi_version)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
