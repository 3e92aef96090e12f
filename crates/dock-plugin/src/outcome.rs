//! Result values returned to the UI layer. Failures are data here, never
//! errors.

use serde::{Deserialize, Serialize};

use dock_core::traits::ToolError;

/// Result of installing or updating from a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// User-facing message.
    pub message: String,
    /// Plugin name, once the manifest was read.
    pub plugin_name: Option<String>,
}

impl InstallOutcome {
    pub(crate) fn ok(plugin_name: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            plugin_name: Some(plugin_name.to_string()),
        }
    }

    pub(crate) fn fail(plugin_name: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            plugin_name: plugin_name.map(str::to_string),
        }
    }
}

/// Result of a flag-only lifecycle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// User-facing message.
    pub message: String,
}

impl OperationOutcome {
    pub(crate) fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub(crate) fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool returned output.
    Success {
        /// Tool output.
        output: String,
        /// Wall time in milliseconds.
        duration_ms: f64,
    },
    /// The call failed.
    Error {
        /// What went wrong.
        error: ToolError,
    },
}

impl ToolOutcome {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
