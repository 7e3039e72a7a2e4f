//! Represents an immutable, content-addressed set of stored files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One uploaded archive, identified by the SHA-256 of its raw bytes.
///
/// Artifacts are created once and never mutated. Deployments reference them
/// by hash; there is no back-pointer, so reference counts are always
/// computed by query.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Lowercase hex SHA-256 digest of the raw archive bytes.
    pub hash: String,

    /// Size of the raw uploaded archive in bytes.
    pub size_bytes: i64,

    /// Number of files that were successfully written to the object store.
    pub file_count: i64,

    /// When this artifact was first recorded.
    pub created_at: DateTime<Utc>,
}
