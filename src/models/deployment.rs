//! Represents the binding of a human-chosen name to an artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a deployment. Stored as upper-case text.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum DeploymentStatus {
    Queued,
    Ready,
    Deleted,
}

/// A named deployment owned by a user.
///
/// The name is globally unique and never changes. A soft-deleted deployment
/// keeps its name reserved until it is purged.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Deployment {
    pub id: Uuid,

    /// Normalized name including the synthetic suffix, e.g. `my-site.site`.
    pub name: String,

    /// ID of the user that owns this deployment.
    pub owner_id: Uuid,

    /// Hash of the referenced artifact.
    pub artifact_hash: String,

    pub status: DeploymentStatus,

    pub created_at: DateTime<Utc>,

    /// Set while the deployment sits in the bin.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Deployment {
    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Listing row: a deployment joined with its artifact's size figures.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct DeploymentSummary {
    pub id: Uuid,
    pub name: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub artifact_hash: String,
    pub size_bytes: i64,
    pub file_count: i64,
}
