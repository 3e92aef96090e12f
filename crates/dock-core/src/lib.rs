//! # dock-core
//!
//! Core crate for the dock host. Contains configuration schemas, the
//! unified error system, the plugin contract (`DockPlugin` / `PluginHost`)
//! and the C-ABI wire types used to cross a plugin's library boundary.
//!
//! This crate has **no** internal dependencies on other dock crates, so
//! plugin libraries can link it without pulling in the host's storage
//! stack.

pub mod config;
pub mod error;
pub mod ffi;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
