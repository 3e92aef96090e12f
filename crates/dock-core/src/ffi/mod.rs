//! C-ABI boundary between the host and plugin libraries.
//!
//! Only `#[repr(C)]` structs and NUL-terminated JSON strings cross the
//! boundary; no Rust type layout is shared. See [`abi`] for the symbols and
//! [`protocol`] for the messages.

pub mod abi;
pub mod protocol;
