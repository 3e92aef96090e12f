//! FFI safety wrappers: conversions between C strings and Rust strings.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use serde::Serialize;

/// Safely converts a C string pointer to a Rust `String`.
///
/// Returns `None` if the pointer is null or the bytes are not UTF-8.
pub fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

/// Converts a Rust string to a `CString`.
///
/// Returns `None` if the string contains null bytes.
pub fn string_to_c_string(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// Serialize `value` into a heap C string whose ownership passes to the
/// caller. `fallback` is used if serialization fails.
pub fn json_into_raw<T: Serialize>(value: &T, fallback: &'static str) -> *mut c_char {
    let json = serde_json::to_string(value).unwrap_or_else(|_| fallback.to_string());
    string_to_c_string(&json)
        .or_else(|| string_to_c_string(fallback))
        .map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Release a string produced by [`json_into_raw`].
///
/// # Safety
///
/// `ptr` must be null or come from [`json_into_raw`] and not be freed twice.
pub unsafe fn free_raw(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}
