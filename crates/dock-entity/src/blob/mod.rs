//! Binary blob rows: hash-addressed icons and name-addressed plugin images.

pub mod icon;
pub mod image;

pub use icon::IconBlob;
pub use image::PluginImage;
