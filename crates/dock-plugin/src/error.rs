//! Error types raised by the plugin runtime.
//!
//! Each stage has its own enum so callers can tell a bad manifest from a
//! broken binary or a misbehaving hook. All of them map into
//! [`AppError`] at the crate boundary.

use std::any::Any;
use std::path::PathBuf;

use thiserror::Error;

use dock_core::error::{AppError, ErrorKind};

use crate::instance::InstanceState;

/// A manifest could not be read or failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// A required field is empty or absent.
    #[error("manifest field '{field}' is required")]
    MissingField {
        /// Field name as written in `plugin.json`.
        field: String,
    },
    /// A field is present but malformed.
    #[error("manifest field '{field}' is invalid: {reason}")]
    InvalidField {
        /// Field name as written in `plugin.json`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The manifest file could not be read.
    #[error("cannot read manifest '{path}': {reason}")]
    Unreadable {
        /// Manifest path.
        path: PathBuf,
        /// I/O failure.
        reason: String,
    },
    /// The manifest is not valid JSON of the expected shape.
    #[error("malformed manifest: {reason}")]
    Malformed {
        /// Parser message.
        reason: String,
    },
}

impl ManifestError {
    /// The offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// The plugin binary could not be loaded or instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// `main` does not exist inside the plugin folder.
    #[error("plugin binary not found: {path}")]
    BinaryNotFound {
        /// Resolved path.
        path: PathBuf,
    },
    /// The OS loader rejected the library.
    #[error("failed to load library '{path}': {reason}")]
    Library {
        /// Library path.
        path: PathBuf,
        /// Loader message.
        reason: String,
    },
    /// The library does not export the factory symbol.
    #[error("library '{path}' does not export '{symbol}'")]
    MissingSymbol {
        /// Library path.
        path: PathBuf,
        /// Symbol name.
        symbol: String,
    },
    /// The library was built against another ABI revision.
    #[error("plugin ABI version {found} is not supported (expected {expected})")]
    AbiMismatch {
        /// Host revision.
        expected: u32,
        /// Plugin revision.
        found: u32,
    },
    /// No type matching `entryClass` exists in the library.
    #[error("entry class '{entry_class}' not found")]
    EntryClassNotFound {
        /// Requested entry class.
        entry_class: String,
    },
    /// The factory or capability query panicked or failed.
    #[error("plugin instantiation failed: {reason}")]
    Instantiation {
        /// Failure description.
        reason: String,
    },
}

/// A plugin hook failed. Always logged, never propagated as a crash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The hook returned an error.
    #[error("plugin '{plugin}' hook '{hook}' failed: {message}")]
    Failed {
        /// Plugin name.
        plugin: String,
        /// Hook name.
        hook: &'static str,
        /// Error message.
        message: String,
    },
    /// The hook panicked.
    #[error("plugin '{plugin}' hook '{hook}' panicked: {message}")]
    Panicked {
        /// Plugin name.
        plugin: String,
        /// Hook name.
        hook: &'static str,
        /// Panic payload.
        message: String,
    },
    /// The hook is not valid in the instance's current state.
    #[error("plugin '{plugin}' cannot run '{hook}' while {state}")]
    InvalidState {
        /// Plugin name.
        plugin: String,
        /// Hook name.
        hook: &'static str,
        /// Current state.
        state: InstanceState,
    },
}

/// A plugin package could not be extracted.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Too many entries in the archive.
    #[error("package contains {count} entries, exceeding limit of {limit}")]
    TooManyEntries {
        /// Entry count.
        count: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Uncompressed size exceeds the limit.
    #[error("package exceeds {limit} byte size limit")]
    TooLarge {
        /// Configured limit.
        limit: u64,
    },
    /// No `plugin.json` at the archive root.
    #[error("package has no plugin.json at its root")]
    MissingManifest,
    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// ZIP library error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Background task failure.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Declared dependencies cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The dependency is not installed.
    #[error("plugin '{plugin}' depends on '{dependency}', which is not installed")]
    Missing {
        /// Dependent plugin.
        plugin: String,
        /// Missing dependency.
        dependency: String,
    },
    /// The installed version is outside the declared range.
    #[error("plugin '{plugin}' requires '{dependency}' {required}, found {found}")]
    VersionMismatch {
        /// Dependent plugin.
        plugin: String,
        /// Dependency.
        dependency: String,
        /// Declared range.
        required: String,
        /// Installed version.
        found: String,
    },
    /// The declared range cannot be parsed.
    #[error("plugin '{plugin}' declares an invalid range '{range}' for '{dependency}'")]
    InvalidRange {
        /// Dependent plugin.
        plugin: String,
        /// Dependency.
        dependency: String,
        /// Declared range.
        range: String,
    },
    /// A plugin declares a version the resolver cannot parse.
    #[error("plugin '{plugin}' has an invalid version '{version}'")]
    InvalidVersion {
        /// Plugin.
        plugin: String,
        /// Declared version.
        version: String,
    },
    /// A dependency exists but could not itself be loaded.
    #[error("plugin '{plugin}' depends on '{dependency}', which failed to resolve")]
    Unavailable {
        /// Dependent plugin.
        plugin: String,
        /// Failed dependency.
        dependency: String,
    },
    /// The plugin is part of a dependency cycle.
    #[error("dependency cycle among: {}", plugins.join(", "))]
    Cycle {
        /// Plugins in the cycle.
        plugins: Vec<String>,
    },
}

impl From<ManifestError> for AppError {
    fn from(err: ManifestError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::plugin(err.to_string())
    }
}

impl From<HookError> for AppError {
    fn from(err: HookError) -> Self {
        match &err {
            HookError::InvalidState { .. } => AppError::invalid_operation(err.to_string()),
            _ => AppError::plugin(err.to_string()),
        }
    }
}

impl From<PackageError> for AppError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Io(e) => {
                AppError::with_source(ErrorKind::Storage, format!("Package I/O error: {e}"), e)
            }
            other => AppError::package(other.to_string()),
        }
    }
}

impl From<DependencyError> for AppError {
    fn from(err: DependencyError) -> Self {
        AppError::plugin(err.to_string())
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_error_names_field() {
        let err = ManifestError::MissingField {
            field: "entryClass".to_string(),
        };
        assert_eq!(err.field(), Some("entryClass"));
        assert!(err.to_string().contains("entryClass"));
        assert_eq!(AppError::from(err).kind, ErrorKind::Validation);
    }

    #[test]
    fn test_panic_message_variants() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(a.as_ref()), "static");
        assert_eq!(panic_message(b.as_ref()), "owned");
        assert_eq!(panic_message(c.as_ref()), "unknown panic payload");
    }
}
