//! Host side of the C-ABI plugin boundary.

pub mod host_bridge;
pub mod proxy;
pub mod safety;

pub use host_bridge::HostSlot;
pub use proxy::FfiPlugin;
