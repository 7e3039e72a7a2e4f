//! Deployment registry: human-chosen names bound to artifacts.
//!
//! Names are normalized, validated and stored with a fixed synthetic suffix
//! (for example `my-site` becomes `my-site.site`). A name stays reserved
//! while its deployment sits in the bin; only a purge frees it.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::deployment::{Deployment, DeploymentStatus, DeploymentSummary},
    services::artifact_repository::{ArtifactRepository, is_unique_violation},
};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 50;

const DEPLOYMENT_COLUMNS: &str =
    "id, name, owner_id, artifact_hash, status, created_at, deleted_at";

const SUMMARY_SELECT: &str = "SELECT d.id, d.name, d.status, d.created_at, d.deleted_at,
            d.artifact_hash, a.size_bytes, a.file_count
     FROM deployments d
     JOIN artifacts a ON d.artifact_hash = a.hash";

/// Normalize a requested name into its bare form (without suffix).
///
/// Lower-cases, drops a scheme, `www.` and anything after the first `/`,
/// drops an already present `suffix`, turns whitespace runs into hyphens,
/// strips everything outside `[a-z0-9-]`, collapses hyphen runs and trims
/// hyphens from both ends.
pub fn normalize_name(raw: &str, suffix: &str) -> String {
    let mut name = raw.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = name.strip_prefix(scheme) {
            name = rest.to_string();
            break;
        }
    }
    if let Some(rest) = name.strip_prefix("www.") {
        name = rest.to_string();
    }
    if let Some((host, _)) = name.split_once('/') {
        name = host.to_string();
    }
    let suffix = suffix.to_lowercase();
    if !suffix.is_empty() {
        if let Some(rest) = name.strip_suffix(suffix.as_str()) {
            name = rest.to_string();
        }
    }

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        let allowed = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
        if !allowed || (c == '-' && out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

/// Full match of `^[a-z0-9](-?[a-z0-9])*$`.
pub fn matches_name_pattern(name: &str) -> bool {
    let bytes = name.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) if alnum(first) && alnum(last) => {}
        _ => return false,
    }
    bytes
        .windows(2)
        .all(|pair| !(pair[0] == b'-' && pair[1] == b'-'))
        && bytes.iter().all(|&b| alnum(b) || b == b'-')
}

pub fn validate_name(name: &str) -> ServiceResult<()> {
    if name.len() < NAME_MIN_LEN || name.len() > NAME_MAX_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "name must be between {} and {} characters after normalization (got `{}`)",
            NAME_MIN_LEN, NAME_MAX_LEN, name
        )));
    }
    if !matches_name_pattern(name) {
        return Err(ServiceError::InvalidInput(format!(
            "name `{}` may only contain lowercase letters, digits and single hyphens",
            name
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DeploymentRegistry {
    db: Arc<SqlitePool>,
    artifacts: ArtifactRepository,
    name_suffix: String,
    max_per_owner: i64,
}

impl DeploymentRegistry {
    pub fn new(
        db: Arc<SqlitePool>,
        artifacts: ArtifactRepository,
        name_suffix: impl Into<String>,
        max_per_owner: i64,
    ) -> Self {
        Self {
            db,
            artifacts,
            name_suffix: name_suffix.into(),
            max_per_owner,
        }
    }

    pub fn name_suffix(&self) -> &str {
        &self.name_suffix
    }

    /// Name shown to users: the stored name without its suffix.
    pub fn display_name<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(self.name_suffix.as_str()).unwrap_or(name)
    }

    /// Bind `raw_name` to the artifact `artifact_hash` for `owner_id`.
    pub async fn bind(
        &self,
        raw_name: &str,
        artifact_hash: &str,
        owner_id: Uuid,
    ) -> ServiceResult<Deployment> {
        let bare = normalize_name(raw_name, &self.name_suffix);
        validate_name(&bare)?;
        let name = format!("{}{}", bare, self.name_suffix);

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM deployments WHERE name = ?")
            .bind(&name)
            .fetch_one(&*self.db)
            .await?;
        if taken > 0 {
            return Err(ServiceError::NameConflict(name));
        }

        if self.artifacts.find_by_hash(artifact_hash).await?.is_none() {
            return Err(ServiceError::NotFound(format!("artifact `{}`", artifact_hash)));
        }

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM deployments WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(&*self.db)
        .await?;
        if owned >= self.max_per_owner {
            return Err(ServiceError::QuotaExceeded {
                limit: self.max_per_owner,
            });
        }

        let deployment = Deployment {
            id: Uuid::new_v4(),
            name,
            owner_id,
            artifact_hash: artifact_hash.to_string(),
            status: DeploymentStatus::Ready,
            created_at: Utc::now(),
            deleted_at: None,
        };

        match sqlx::query(
            "INSERT INTO deployments (id, name, owner_id, artifact_hash, status, created_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(deployment.id)
        .bind(&deployment.name)
        .bind(deployment.owner_id)
        .bind(&deployment.artifact_hash)
        .bind(deployment.status)
        .bind(deployment.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                info!(
                    deployment_id = %deployment.id,
                    name = %deployment.name,
                    hash = %deployment.artifact_hash,
                    "deployment bound"
                );
                Ok(deployment)
            }
            Err(err) if is_unique_violation(&err) => Err(ServiceError::NameConflict(deployment.name)),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch a deployment owned by `owner_id`, whatever its status.
    pub async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<Deployment> {
        sqlx::query_as::<_, Deployment>(&format!(
            "SELECT {} FROM deployments WHERE id = ? AND owner_id = ?",
            DEPLOYMENT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("deployment `{}`", id)))
    }

    /// Look up a servable deployment by its exact stored name.
    pub async fn find_ready_by_name(&self, name: &str) -> ServiceResult<Option<Deployment>> {
        let deployment = sqlx::query_as::<_, Deployment>(&format!(
            "SELECT {} FROM deployments
             WHERE name = ? AND status = 'READY' AND deleted_at IS NULL",
            DEPLOYMENT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(deployment)
    }

    /// Move a deployment into the bin. The name stays reserved.
    pub async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<Deployment> {
        let current = self.find_owned(id, owner_id).await?;
        if current.is_soft_deleted() {
            return Err(ServiceError::InvalidState(format!(
                "deployment `{}` is already in the bin",
                id
            )));
        }
        let deployment = self
            .update_state(id, owner_id, DeploymentStatus::Deleted, Some(Utc::now()))
            .await?;
        info!(deployment_id = %id, name = %deployment.name, "deployment moved to bin");
        Ok(deployment)
    }

    /// Take a deployment out of the bin and make it servable again.
    pub async fn restore(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<Deployment> {
        let current = self.find_owned(id, owner_id).await?;
        if !current.is_soft_deleted() {
            return Err(ServiceError::InvalidState(format!(
                "deployment `{}` is not in the bin",
                id
            )));
        }
        let deployment = self
            .update_state(id, owner_id, DeploymentStatus::Ready, None)
            .await?;
        info!(deployment_id = %id, name = %deployment.name, "deployment restored");
        Ok(deployment)
    }

    async fn update_state(
        &self,
        id: Uuid,
        owner_id: Uuid,
        status: DeploymentStatus,
        deleted_at: Option<chrono::DateTime<Utc>>,
    ) -> ServiceResult<Deployment> {
        sqlx::query_as::<_, Deployment>(&format!(
            "UPDATE deployments SET status = ?, deleted_at = ?
             WHERE id = ? AND owner_id = ?
             RETURNING {}",
            DEPLOYMENT_COLUMNS
        ))
        .bind(status)
        .bind(deleted_at)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("deployment `{}`", id)))
    }

    /// Live deployments of `owner_id`, newest first.
    pub async fn list_active(&self, owner_id: Uuid) -> ServiceResult<Vec<DeploymentSummary>> {
        let rows = sqlx::query_as::<_, DeploymentSummary>(&format!(
            "{} WHERE d.owner_id = ? AND d.deleted_at IS NULL ORDER BY d.created_at DESC",
            SUMMARY_SELECT
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Soft-deleted deployments of `owner_id`, most recently deleted first.
    pub async fn list_bin(&self, owner_id: Uuid) -> ServiceResult<Vec<DeploymentSummary>> {
        let rows = sqlx::query_as::<_, DeploymentSummary>(&format!(
            "{} WHERE d.owner_id = ? AND d.deleted_at IS NOT NULL ORDER BY d.deleted_at DESC",
            SUMMARY_SELECT
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Deployments other than `excluding` that are not soft-deleted and
    /// reference `artifact_hash`.
    pub async fn count_live_references<'e, E>(
        executor: E,
        artifact_hash: &str,
        excluding: Uuid,
    ) -> ServiceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM deployments
             WHERE artifact_hash = ? AND id != ? AND deleted_at IS NULL",
        )
        .bind(artifact_hash)
        .bind(excluding)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Remove a deployment row. Returns whether a row was removed.
    pub async fn delete<'e, E>(executor: E, id: Uuid, owner_id: Uuid) -> ServiceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM deployments WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
