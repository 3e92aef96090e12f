//! Content- and name-addressed binary storage.

pub mod icon;
pub mod image;

pub use icon::{IconStore, content_hash};
pub use image::PluginImageStore;
