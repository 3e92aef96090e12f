//! Navigation tab placement registry.

pub mod registry;

pub use registry::{NavigationRegistry, tab_id};
