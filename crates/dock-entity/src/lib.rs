//! # dock-entity
//!
//! Persisted row types for the dock plugin runtime. Every struct in this
//! crate represents a database table row or the input needed to create
//! one. Row structs derive `Debug`, `Clone`, `Serialize`, `Deserialize`
//! and `sqlx::FromRow`.

pub mod blob;
pub mod kv;
pub mod navigation;
pub mod plugin;
pub mod tool;
