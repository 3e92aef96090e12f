//! # dock-database
//!
//! Embedded SQLite connection management and concrete repository
//! implementations for every persisted dock table.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
