//! Tool statistics entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Aggregated call statistics for one plugin tool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ToolStatistics {
    /// Composite id `"{plugin}:{tool}"` (primary key).
    pub id: String,
    /// Owning plugin.
    pub plugin_name: String,
    /// Tool name.
    pub tool_name: String,
    /// Total calls.
    pub call_count: i64,
    /// Successful calls.
    pub success_count: i64,
    /// Failed calls.
    pub failure_count: i64,
    /// Running mean of call duration in milliseconds.
    pub average_duration_ms: f64,
    /// First recorded call.
    pub first_call_at: DateTime<Utc>,
    /// Most recent call.
    pub last_call_at: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ToolStatistics {
    /// Fraction of successful calls, or `None` before the first call.
    pub fn success_rate(&self) -> Option<f64> {
        (self.call_count > 0).then(|| self.success_count as f64 / self.call_count as f64)
    }
}
