//! Hash-addressed icon blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A deduplicated icon keyed by the SHA-256 of its content.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IconBlob {
    /// Lowercase hex SHA-256 of `data` (primary key).
    pub hash: String,
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Number of owners sharing this blob.
    pub reference_count: i64,
    /// When the blob was first stored.
    pub created_at: DateTime<Utc>,
    /// When the blob was last read or re-referenced.
    pub last_accessed_at: DateTime<Utc>,
}
