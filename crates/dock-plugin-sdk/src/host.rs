//! Plugin-side [`PluginHost`] that forwards every call to the dock host
//! as a JSON [`HostRequest`].

use std::ffi::{CStr, CString};
use std::path::PathBuf;

use dock_core::error::{AppError, ErrorKind};
use dock_core::ffi::abi::FfiHostApi;
use dock_core::ffi::protocol::{HostRequest, HostResponse, decode_bytes, encode_bytes};
use dock_core::result::AppResult;
use dock_core::traits::{LogLevel, PluginHost};

/// Host handle given to plugins built with this SDK.
pub struct FfiHost {
    api: FfiHostApi,
}

// The host side of `FfiHostApi` is thread-safe; `ctx` stays valid until
// the plugin object is destroyed.
unsafe impl Send for FfiHost {}
unsafe impl Sync for FfiHost {}

impl FfiHost {
    /// Wrap the callbacks passed to the library factory.
    pub fn new(api: FfiHostApi) -> Self {
        Self { api }
    }

    fn call(&self, request: &HostRequest) -> AppResult<HostResponse> {
        let json = serde_json::to_string(request).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Failed to encode host request", e)
        })?;
        let json = CString::new(json)
            .map_err(|_| AppError::validation("Host request contains NUL bytes"))?;

        let raw = unsafe { (self.api.call)(self.api.ctx, json.as_ptr()) };
        if raw.is_null() {
            return Err(AppError::plugin("Host returned no response"));
        }
        let text = unsafe { CStr::from_ptr(raw) }.to_str().map(str::to_owned);
        unsafe { (self.api.free_string)(raw) };
        let text = text.map_err(|_| AppError::plugin("Host response is not UTF-8"))?;

        let response: HostResponse = serde_json::from_str(&text).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Invalid host response", e)
        })?;
        match response {
            HostResponse::Error { kind, message } => Err(AppError::new(kind, message)),
            other => Ok(other),
        }
    }

    fn done(&self, request: HostRequest) -> AppResult<()> {
        match self.call(&request)? {
            HostResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn value(&self, request: HostRequest) -> AppResult<Option<String>> {
        match self.call(&request)? {
            HostResponse::Value { value } => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    fn keys(&self, request: HostRequest) -> AppResult<Vec<String>> {
        match self.call(&request)? {
            HostResponse::Keys { keys } => Ok(keys),
            other => Err(unexpected(other)),
        }
    }

    fn text(&self, request: HostRequest) -> AppResult<String> {
        match self.call(&request)? {
            HostResponse::Text { text } => Ok(text),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: HostResponse) -> AppError {
    AppError::plugin(format!("Unexpected host response: {response:?}"))
}

impl PluginHost for FfiHost {
    fn plugin_name(&self) -> String {
        self.text(HostRequest::PluginName).unwrap_or_default()
    }

    fn log(&self, level: LogLevel, message: &str) {
        let _ = self.done(HostRequest::Log {
            level,
            message: message.to_string(),
        });
    }

    fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        self.value(HostRequest::GetValue { key: key.to_string() })
    }

    fn set_value(&self, key: &str, value: &str) -> AppResult<()> {
        self.done(HostRequest::SetValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn delete_value(&self, key: &str) -> AppResult<()> {
        self.done(HostRequest::DeleteValue { key: key.to_string() })
    }

    fn value_keys(&self) -> AppResult<Vec<String>> {
        self.keys(HostRequest::ValueKeys)
    }

    fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        self.value(HostRequest::GetSetting { key: key.to_string() })
    }

    fn set_setting(&self, key: &str, value: &str, description: Option<&str>) -> AppResult<()> {
        self.done(HostRequest::SetSetting {
            key: key.to_string(),
            value: value.to_string(),
            description: description.map(str::to_string),
        })
    }

    fn delete_setting(&self, key: &str) -> AppResult<()> {
        self.done(HostRequest::DeleteSetting { key: key.to_string() })
    }

    fn setting_keys(&self) -> AppResult<Vec<String>> {
        self.keys(HostRequest::SettingKeys)
    }

    fn save_image(&self, key: &str, data: &[u8]) -> AppResult<()> {
        self.done(HostRequest::SaveImage {
            key: key.to_string(),
            data: encode_bytes(data),
        })
    }

    fn load_image(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        match self.call(&HostRequest::LoadImage { key: key.to_string() })? {
            HostResponse::Image { data } => data.as_deref().map(decode_bytes).transpose(),
            other => Err(unexpected(other)),
        }
    }

    fn delete_image(&self, key: &str) -> AppResult<()> {
        self.done(HostRequest::DeleteImage { key: key.to_string() })
    }

    fn dependency_value(&self, dependency: &str, key: &str) -> AppResult<Option<String>> {
        self.value(HostRequest::DependencyValue {
            dependency: dependency.to_string(),
            key: key.to_string(),
        })
    }

    fn dependency_value_keys(&self, dependency: &str) -> AppResult<Vec<String>> {
        self.keys(HostRequest::DependencyValueKeys {
            dependency: dependency.to_string(),
        })
    }

    fn dependency_setting(&self, dependency: &str, key: &str) -> AppResult<Option<String>> {
        self.value(HostRequest::DependencySetting {
            dependency: dependency.to_string(),
            key: key.to_string(),
        })
    }

    fn dependency_setting_keys(&self, dependency: &str) -> AppResult<Vec<String>> {
        self.keys(HostRequest::DependencySettingKeys {
            dependency: dependency.to_string(),
        })
    }

    fn config_directory(&self) -> PathBuf {
        PathBuf::from(self.text(HostRequest::ConfigDirectory).unwrap_or_default())
    }

    fn data_directory(&self) -> PathBuf {
        PathBuf::from(self.text(HostRequest::DataDirectory).unwrap_or_default())
    }
}
