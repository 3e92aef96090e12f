//! Navigation tab placement.

pub mod model;

pub use model::NavigationTabConfig;
