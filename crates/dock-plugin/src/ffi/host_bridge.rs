//! Callbacks a plugin library uses to reach its host.
//!
//! The library receives an [`FfiHostApi`] whose `ctx` points at a
//! [`HostSlot`]. The slot is empty until the plugin is initialized, so
//! calls made from the factory are answered with an error.

use std::os::raw::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use dock_core::error::ErrorKind;
use dock_core::ffi::abi::FfiHostApi;
use dock_core::ffi::protocol::{HostRequest, HostResponse, decode_bytes, encode_bytes};
use dock_core::result::AppResult;
use dock_core::traits::PluginHost;

use crate::error::panic_message;

use super::safety::{c_str_to_string, free_raw, json_into_raw};

const FALLBACK_RESPONSE: &str =
    r#"{"status":"error","kind":"Internal","message":"failed to encode host response"}"#;

/// Holder for the host handle of one plugin.
#[derive(Default)]
pub struct HostSlot {
    host: RwLock<Option<Arc<dyn PluginHost>>>,
}

impl HostSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the host handle.
    pub fn set(&self, host: Arc<dyn PluginHost>) {
        if let Ok(mut guard) = self.host.write() {
            *guard = Some(host);
        }
    }

    /// Drop the host handle.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.host.write() {
            *guard = None;
        }
    }

    /// Current host handle, if any.
    pub fn get(&self) -> Option<Arc<dyn PluginHost>> {
        self.host.read().ok().and_then(|guard| guard.clone())
    }

    /// Callback table pointing at this slot. The slot must outlive every
    /// use of the returned table.
    pub fn api(&self) -> FfiHostApi {
        FfiHostApi {
            ctx: self as *const HostSlot as *const c_void,
            call: host_call,
            free_string: host_free_string,
        }
    }
}

impl std::fmt::Debug for HostSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSlot")
            .field("initialized", &self.get().is_some())
            .finish()
    }
}

/// `FfiHostApi::call` implementation.
///
/// # Safety
///
/// `ctx` must point at a live [`HostSlot`] and `request_json` must be null
/// or a NUL-terminated string.
pub unsafe extern "C" fn host_call(ctx: *const c_void, request_json: *const c_char) -> *mut c_char {
    let response = panic::catch_unwind(AssertUnwindSafe(|| {
        if ctx.is_null() {
            return HostResponse::Error {
                kind: ErrorKind::Internal,
                message: "missing host context".to_string(),
            };
        }
        let slot = unsafe { &*(ctx as *const HostSlot) };

        let Some(json) = c_str_to_string(request_json) else {
            return HostResponse::Error {
                kind: ErrorKind::Serialization,
                message: "request is not a UTF-8 string".to_string(),
            };
        };
        let request = match serde_json::from_str::<HostRequest>(&json) {
            Ok(request) => request,
            Err(e) => {
                return HostResponse::Error {
                    kind: ErrorKind::Serialization,
                    message: format!("invalid host request: {e}"),
                };
            }
        };

        match slot.get() {
            Some(host) => dispatch(host.as_ref(), request),
            None => HostResponse::Error {
                kind: ErrorKind::InvalidOperation,
                message: "host API is not available before initialization".to_string(),
            },
        }
    }))
    .unwrap_or_else(|payload| HostResponse::Error {
        kind: ErrorKind::Internal,
        message: format!("host panicked: {}", panic_message(payload.as_ref())),
    });

    json_into_raw(&response, FALLBACK_RESPONSE)
}

/// `FfiHostApi::free_string` implementation.
///
/// # Safety
///
/// `ptr` must be null or a string returned by [`host_call`].
pub unsafe extern "C" fn host_free_string(ptr: *mut c_char) {
    unsafe { free_raw(ptr) }
}

/// Execute one request against the host.
pub fn dispatch(host: &dyn PluginHost, request: HostRequest) -> HostResponse {
    match request {
        HostRequest::PluginName => HostResponse::Text {
            text: host.plugin_name(),
        },
        HostRequest::Log { level, message } => {
            host.log(level, &message);
            HostResponse::Ok
        }
        HostRequest::GetValue { key } => value(host.get_value(&key)),
        HostRequest::SetValue { key, value } => done(host.set_value(&key, &value)),
        HostRequest::DeleteValue { key } => done(host.delete_value(&key)),
        HostRequest::ValueKeys => keys(host.value_keys()),
        HostRequest::GetSetting { key } => value(host.get_setting(&key)),
        HostRequest::SetSetting {
            key,
            value,
            description,
        } => done(host.set_setting(&key, &value, description.as_deref())),
        HostRequest::DeleteSetting { key } => done(host.delete_setting(&key)),
        HostRequest::SettingKeys => keys(host.setting_keys()),
        HostRequest::SaveImage { key, data } => {
            done(decode_bytes(&data).and_then(|bytes| host.save_image(&key, &bytes)))
        }
        HostRequest::LoadImage { key } => match host.load_image(&key) {
            Ok(data) => HostResponse::Image {
                data: data.as_deref().map(encode_bytes),
            },
            Err(e) => HostResponse::from_error(&e),
        },
        HostRequest::DeleteImage { key } => done(host.delete_image(&key)),
        HostRequest::DependencyValue { dependency, key } => {
            value(host.dependency_value(&dependency, &key))
        }
        HostRequest::DependencyValueKeys { dependency } => {
            keys(host.dependency_value_keys(&dependency))
        }
        HostRequest::DependencySetting { dependency, key } => {
            value(host.dependency_setting(&dependency, &key))
        }
        HostRequest::DependencySettingKeys { dependency } => {
            keys(host.dependency_setting_keys(&dependency))
        }
        HostRequest::ConfigDirectory => HostResponse::Text {
            text: host.config_directory().to_string_lossy().into_owned(),
        },
        HostRequest::DataDirectory => HostResponse::Text {
            text: host.data_directory().to_string_lossy().into_owned(),
        },
    }
}

fn done(result: AppResult<()>) -> HostResponse {
    match result {
        Ok(()) => HostResponse::Ok,
        Err(e) => HostResponse::from_error(&e),
    }
}

fn value(result: AppResult<Option<String>>) -> HostResponse {
    match result {
        Ok(value) => HostResponse::Value { value },
        Err(e) => HostResponse::from_error(&e),
    }
}

fn keys(result: AppResult<Vec<String>>) -> HostResponse {
    match result {
        Ok(keys) => HostResponse::Keys { keys },
        Err(e) => HostResponse::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::ffi::CString;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use dock_core::traits::LogLevel;

    use dock_core::error::AppError;

    use super::*;

    #[derive(Default)]
    struct MemoryHost {
        values: Mutex<HashMap<String, String>>,
    }

    impl PluginHost for MemoryHost {
        fn plugin_name(&self) -> String {
            "com.test.memory".to_string()
        }
        fn log(&self, _level: LogLevel, _message: &str) {}
        fn get_value(&self, key: &str) -> AppResult<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }
        fn set_value(&self, key: &str, value: &str) -> AppResult<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn delete_value(&self, key: &str) -> AppResult<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
        fn value_keys(&self) -> AppResult<Vec<String>> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }
        fn get_setting(&self, _key: &str) -> AppResult<Option<String>> {
            Ok(None)
        }
        fn set_setting(&self, _: &str, _: &str, _: Option<&str>) -> AppResult<()> {
            Ok(())
        }
        fn delete_setting(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }
        fn setting_keys(&self) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn save_image(&self, _key: &str, _data: &[u8]) -> AppResult<()> {
            Ok(())
        }
        fn load_image(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
            Ok(Some(vec![1, 2, 3]))
        }
        fn delete_image(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }
        fn dependency_value(&self, dependency: &str, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::invalid_operation(format!(
                "'{dependency}' is not a declared dependency"
            )))
        }
        fn dependency_value_keys(&self, _dependency: &str) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn dependency_setting(&self, _: &str, _: &str) -> AppResult<Option<String>> {
            Ok(None)
        }
        fn dependency_setting_keys(&self, _dependency: &str) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn config_directory(&self) -> PathBuf {
            PathBuf::from("/plugins/com.test.memory")
        }
        fn data_directory(&self) -> PathBuf {
            PathBuf::from("/plugins/com.test.memory/Data")
        }
    }

    fn call(slot: &HostSlot, request: &str) -> HostResponse {
        let api = slot.api();
        let request = CString::new(request).unwrap();
        unsafe {
            let raw = (api.call)(api.ctx, request.as_ptr());
            let text = c_str_to_string(raw).unwrap();
            (api.free_string)(raw);
            serde_json::from_str(&text).unwrap()
        }
    }

    #[test]
    fn test_empty_slot_rejects_calls() {
        let slot = HostSlot::new();
        assert!(matches!(
            call(&slot, r#"{"op":"value_keys"}"#),
            HostResponse::Error {
                kind: ErrorKind::InvalidOperation,
                ..
            }
        ));
    }

    #[test]
    fn test_calls_reach_host() {
        let slot = HostSlot::new();
        slot.set(Arc::new(MemoryHost::default()));

        assert_eq!(
            call(&slot, r#"{"op":"set_value","key":"k","value":"v"}"#),
            HostResponse::Ok
        );
        assert_eq!(
            call(&slot, r#"{"op":"get_value","key":"k"}"#),
            HostResponse::Value {
                value: Some("v".to_string())
            }
        );
        assert_eq!(
            call(&slot, r#"{"op":"load_image","key":"i"}"#),
            HostResponse::Image {
                data: Some(encode_bytes(&[1, 2, 3]))
            }
        );
        assert!(matches!(
            call(&slot, r#"{"op":"dependency_value","dependency":"x.y","key":"k"}"#),
            HostResponse::Error {
                kind: ErrorKind::InvalidOperation,
                ..
            }
        ));
        assert!(matches!(
            call(&slot, "not json"),
            HostResponse::Error {
                kind: ErrorKind::Serialization,
                ..
            }
        ));

        slot.clear();
        assert!(slot.get().is_none());
    }
}
