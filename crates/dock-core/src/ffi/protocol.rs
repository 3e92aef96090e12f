//! JSON messages exchanged across the plugin boundary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::traits::plugin::{Capability, LogLevel, ToolError, ToolParams};

/// Host → plugin request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PluginRequest {
    /// Report declared capabilities.
    Capabilities,
    /// Hand the plugin its host handle.
    Initialize,
    /// Post-initialize hook.
    OnInit,
    /// All plugins from the current scan are loaded.
    OnAllPluginsLoaded,
    /// Enable hook.
    OnEnable,
    /// Disable hook.
    OnDisable,
    /// Destroy hook.
    OnDestroy,
    /// Run a tool.
    InvokeTool {
        /// Tool name.
        tool: String,
        /// Tool parameters.
        #[serde(default)]
        params: ToolParams,
    },
}

/// Plugin → host response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PluginResponse {
    /// Hook completed.
    Ok,
    /// Declared capabilities.
    Capabilities {
        /// Capability list.
        capabilities: Vec<Capability>,
    },
    /// Tool output.
    ToolResult {
        /// Output string.
        output: String,
    },
    /// Tool error payload.
    ToolError {
        /// The error.
        error: ToolError,
    },
    /// Hook failed or panicked.
    Error {
        /// Failure description.
        message: String,
        /// Whether the failure was a panic.
        #[serde(default)]
        panicked: bool,
    },
}

/// Plugin → host request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostRequest {
    /// Identity of the calling plugin.
    PluginName,
    /// Emit a log line.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
    /// Read a key-value entry.
    GetValue {
        /// Key.
        key: String,
    },
    /// Write a key-value entry.
    SetValue {
        /// Key.
        key: String,
        /// Value.
        value: String,
    },
    /// Delete a key-value entry.
    DeleteValue {
        /// Key.
        key: String,
    },
    /// List key-value keys.
    ValueKeys,
    /// Read a setting.
    GetSetting {
        /// Key.
        key: String,
    },
    /// Write a setting.
    SetSetting {
        /// Key.
        key: String,
        /// Value.
        value: String,
        /// Optional description.
        #[serde(default)]
        description: Option<String>,
    },
    /// Delete a setting.
    DeleteSetting {
        /// Key.
        key: String,
    },
    /// List setting keys.
    SettingKeys,
    /// Store an image.
    SaveImage {
        /// Image key.
        key: String,
        /// Base64-encoded bytes.
        data: String,
    },
    /// Load an image.
    LoadImage {
        /// Image key.
        key: String,
    },
    /// Delete an image.
    DeleteImage {
        /// Image key.
        key: String,
    },
    /// Read a dependency's key-value entry.
    DependencyValue {
        /// Dependency plugin name.
        dependency: String,
        /// Key.
        key: String,
    },
    /// List a dependency's key-value keys.
    DependencyValueKeys {
        /// Dependency plugin name.
        dependency: String,
    },
    /// Read a dependency's setting.
    DependencySetting {
        /// Dependency plugin name.
        dependency: String,
        /// Key.
        key: String,
    },
    /// List a dependency's setting keys.
    DependencySettingKeys {
        /// Dependency plugin name.
        dependency: String,
    },
    /// Plugin configuration directory.
    ConfigDirectory,
    /// Plugin data directory.
    DataDirectory,
}

/// Host → plugin response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HostResponse {
    /// Request completed with no payload.
    Ok,
    /// Optional string value.
    Value {
        /// The value, if present.
        value: Option<String>,
    },
    /// Key list.
    Keys {
        /// The keys.
        keys: Vec<String>,
    },
    /// Optional base64 image bytes.
    Image {
        /// Base64-encoded bytes, if present.
        data: Option<String>,
    },
    /// Plain string payload (names and paths).
    Text {
        /// The text.
        text: String,
    },
    /// Request failed.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },
}

impl HostResponse {
    /// Build an error response from an application error.
    pub fn from_error(err: &AppError) -> Self {
        Self::Error {
            kind: err.kind,
            message: err.message.clone(),
        }
    }
}

/// Encode binary payloads for transport.
pub fn encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a transported binary payload.
pub fn decode_bytes(data: &str) -> Result<Vec<u8>, AppError> {
    STANDARD.decode(data).map_err(|e| {
        AppError::with_source(ErrorKind::Serialization, "Invalid base64 payload", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tags() {
        let json = serde_json::to_string(&PluginRequest::OnEnable).unwrap();
        assert_eq!(json, r#"{"op":"on_enable"}"#);

        let req: HostRequest =
            serde_json::from_str(r#"{"op":"set_setting","key":"theme","value":"dark"}"#).unwrap();
        assert_eq!(
            req,
            HostRequest::SetSetting {
                key: "theme".to_string(),
                value: "dark".to_string(),
                description: None,
            }
        );
    }

    #[test]
    fn test_error_response_keeps_kind() {
        let err = AppError::invalid_operation("undeclared dependency");
        match HostResponse::from_error(&err) {
            HostResponse::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::InvalidOperation);
                assert_eq!(message, "undeclared dependency");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_bytes_survive_transport() {
        let data = vec![0u8, 159, 146, 150, 255];
        assert_eq!(decode_bytes(&encode_bytes(&data)).unwrap(), data);
        assert!(decode_bytes("not base64!").is_err());
    }
}
