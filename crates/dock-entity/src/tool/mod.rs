//! Tool invocation statistics.

pub mod statistics;

pub use statistics::ToolStatistics;
