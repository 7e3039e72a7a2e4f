use crate::{
    config::AppConfig,
    services::{
        artifact_repository::ArtifactRepository, deployment_registry::DeploymentRegistry,
        ingest::IngestPipeline, lifecycle::LifecycleManager, object_store::ObjectStore,
        resolver::ServingResolver,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub store: Arc<dyn ObjectStore>,
    pub artifacts: ArtifactRepository,
    pub ingest: IngestPipeline,
    pub registry: DeploymentRegistry,
    pub resolver: ServingResolver,
    pub lifecycle: LifecycleManager,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, store: Arc<dyn ObjectStore>, cfg: &AppConfig) -> Self {
        let artifacts = ArtifactRepository::new(db.clone());
        let registry = DeploymentRegistry::new(
            db.clone(),
            artifacts.clone(),
            cfg.name_suffix.clone(),
            cfg.max_deployments_per_owner,
        );
        let ingest = IngestPipeline::new(
            artifacts.clone(),
            store.clone(),
            cfg.limits,
            cfg.upload_concurrency,
        );
        let resolver =
            ServingResolver::new(registry.clone(), store.clone(), cfg.mount_prefix.clone());
        let lifecycle = LifecycleManager::new(db.clone(), registry.clone(), store.clone());

        Self {
            db,
            store,
            artifacts,
            ingest,
            registry,
            resolver,
            lifecycle,
            max_upload_bytes: cfg.limits.max_upload_bytes,
        }
    }
}
