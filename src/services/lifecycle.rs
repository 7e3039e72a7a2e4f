//! Permanent deletion with reference-counted storage reclamation.
//!
//! The reference count is never stored. At purge time a live query counts
//! the other deployments that still point at the artifact and are not in
//! the bin; only when that count is zero are the artifact row and its
//! objects removed.

use crate::{
    errors::ServiceResult,
    models::deployment::Deployment,
    services::{
        artifact_repository::ArtifactRepository, deployment_registry::DeploymentRegistry,
        object_store::ObjectStore,
    },
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct PurgeOutcome {
    pub deployment_id: Uuid,
    pub artifact_hash: String,
    /// Whether the artifact record was deleted along with the deployment.
    pub artifact_removed: bool,
    /// Objects removed from the store; `None` when removal failed or was
    /// not attempted.
    pub objects_removed: Option<usize>,
}

#[derive(Clone)]
pub struct LifecycleManager {
    db: Arc<SqlitePool>,
    registry: DeploymentRegistry,
    store: Arc<dyn ObjectStore>,
}

impl LifecycleManager {
    pub fn new(
        db: Arc<SqlitePool>,
        registry: DeploymentRegistry,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            db,
            registry,
            store,
        }
    }

    /// Move a deployment into the bin.
    pub async fn soft_delete(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<Deployment> {
        self.registry.soft_delete(id, owner_id).await
    }

    /// Take a deployment out of the bin.
    pub async fn restore(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<Deployment> {
        self.registry.restore(id, owner_id).await
    }

    /// Irreversibly delete a deployment owned by `owner_id`.
    ///
    /// When no other live deployment references the artifact, its objects
    /// are removed first, then the artifact row and the deployment row in one
    /// transaction. The artifact row outlives its objects: an ingestion of
    /// the same bytes racing the purge takes the existing row instead of
    /// recording a new one over objects being removed. Deleting the artifact
    /// cascades to binned deployments that still pointed at it. Object
    /// removal is best effort: a failure leaves an orphaned namespace behind
    /// but never fails the purge.
    pub async fn purge(&self, id: Uuid, owner_id: Uuid) -> ServiceResult<PurgeOutcome> {
        let deployment = self.registry.find_owned(id, owner_id).await?;
        let hash = deployment.artifact_hash.clone();

        let others = DeploymentRegistry::count_live_references(&*self.db, &hash, id).await?;
        let reclaim = others == 0;

        let objects_removed = if reclaim {
            match self.store.remove_prefix(&hash).await {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!(hash = %hash, error = %err, "failed to remove artifact objects");
                    None
                }
            }
        } else {
            None
        };

        let mut tx = self.db.begin().await?;
        let artifact_removed = if reclaim {
            ArtifactRepository::delete(&mut *tx, &hash).await?
        } else {
            false
        };
        DeploymentRegistry::delete(&mut *tx, id, owner_id).await?;
        tx.commit().await?;

        info!(
            deployment_id = %id,
            hash = %hash,
            other_references = others,
            artifact_removed,
            "deployment purged"
        );

        Ok(PurgeOutcome {
            deployment_id: id,
            artifact_hash: hash,
            artifact_removed,
            objects_removed,
        })
    }
}
