//! Integration tests for the dock plugin runtime.

mod dependency_test;
mod helpers;
mod install_test;
mod lifecycle_test;
mod tool_test;
mod update_test;
