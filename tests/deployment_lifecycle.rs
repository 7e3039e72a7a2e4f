mod common;

use artifact_host::{
    config::AppConfig,
    errors::ServiceError,
    models::deployment::DeploymentStatus,
    services::object_store::InMemoryObjectStore,
    state::AppState,
};
use artifact_host::services::ingest::IngestStatus;
use common::{GatedStore, INDEX_HTML, build_zip, digest, memory_state, site_zip, state_with};
use std::sync::Arc;
use uuid::Uuid;

async fn ingested(state: &AppState) -> String {
    let raw = site_zip();
    let hash = digest(&raw);
    state.ingest.ingest(raw, &hash).await.unwrap();
    hash
}

#[tokio::test]
async fn bind_normalizes_and_appends_suffix() {
    let (state, _) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();

    let deployment = state.registry.bind("My Cool Site!!", &hash, owner).await.unwrap();

    assert_eq!(deployment.name, "my-cool-site.site");
    assert_eq!(deployment.status, DeploymentStatus::Ready);
    assert_eq!(deployment.owner_id, owner);
    assert!(deployment.deleted_at.is_none());
    assert_eq!(state.registry.display_name(&deployment.name), "my-cool-site");
}

#[tokio::test]
async fn bind_rejects_bad_names_taken_names_and_unknown_artifacts() {
    let (state, _) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();

    let err = state.registry.bind("!!", &hash, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    state.registry.bind("blog", &hash, owner).await.unwrap();
    let err = state
        .registry
        .bind("https://blog.site", &hash, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NameConflict(ref name) if name == "blog.site"));

    let err = state
        .registry
        .bind("other", &digest(b"never uploaded"), owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn quota_counts_binned_deployments() {
    let cfg = AppConfig {
        max_deployments_per_owner: 2,
        ..AppConfig::default()
    };
    let state = state_with(Arc::new(InMemoryObjectStore::new()), &cfg).await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();

    let first = state.registry.bind("one-site", &hash, owner).await.unwrap();
    state.registry.bind("two-site", &hash, owner).await.unwrap();
    state.lifecycle.soft_delete(first.id, owner).await.unwrap();

    let err = state.registry.bind("three-site", &hash, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::QuotaExceeded { limit: 2 }));

    // other owners are unaffected
    state
        .registry
        .bind("three-site", &hash, Uuid::new_v4())
        .await
        .unwrap();
}

#[tokio::test]
async fn soft_delete_and_restore_round_trip() {
    let (state, _) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("portfolio", &hash, owner).await.unwrap();

    let binned = state.lifecycle.soft_delete(deployment.id, owner).await.unwrap();
    assert_eq!(binned.status, DeploymentStatus::Deleted);
    assert!(binned.deleted_at.is_some());
    assert!(state.registry.list_active(owner).await.unwrap().is_empty());
    assert_eq!(state.registry.list_bin(owner).await.unwrap().len(), 1);

    // name stays reserved while binned
    let err = state
        .registry
        .bind("portfolio", &hash, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NameConflict(_)));

    let err = state.lifecycle.soft_delete(deployment.id, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let restored = state.lifecycle.restore(deployment.id, owner).await.unwrap();
    assert_eq!(restored.status, DeploymentStatus::Ready);
    assert!(restored.deleted_at.is_none());

    let err = state.lifecycle.restore(deployment.id, owner).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn operations_are_scoped_to_owner() {
    let (state, _) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("mine", &hash, owner).await.unwrap();

    let stranger = Uuid::new_v4();
    let err = state.lifecycle.soft_delete(deployment.id, stranger).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    let err = state.lifecycle.purge(deployment.id, stranger).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(state.registry.list_active(stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn purging_last_reference_reclaims_artifact_and_objects() {
    let (state, store) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("solo", &hash, owner).await.unwrap();

    let outcome = state.lifecycle.purge(deployment.id, owner).await.unwrap();

    assert!(outcome.artifact_removed);
    assert_eq!(outcome.objects_removed, Some(3));
    assert!(state.artifacts.find_by_hash(&hash).await.unwrap().is_none());
    assert!(store.keys_with_prefix(&hash).await.is_empty());
    assert!(state.registry.find_ready_by_name("solo.site").await.unwrap().is_none());
}

#[tokio::test]
async fn purging_shared_artifact_keeps_it_for_the_other_deployment() {
    let (state, store) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();
    let first = state.registry.bind("first", &hash, owner).await.unwrap();
    state.registry.bind("second", &hash, Uuid::new_v4()).await.unwrap();

    let outcome = state.lifecycle.purge(first.id, owner).await.unwrap();

    assert!(!outcome.artifact_removed);
    assert_eq!(outcome.objects_removed, None);
    assert!(state.artifacts.find_by_hash(&hash).await.unwrap().is_some());
    assert_eq!(store.keys_with_prefix(&hash).await.len(), 3);

    let asset = state.resolver.resolve("second.site", "css/app.css").await.unwrap();
    assert_eq!(&asset.body[..], b"body { color: red; }");
}

#[tokio::test]
async fn binned_sibling_does_not_keep_artifact_alive() {
    let (state, store) = memory_state().await;
    let hash = ingested(&state).await;
    let owner = Uuid::new_v4();
    let live = state.registry.bind("live", &hash, owner).await.unwrap();
    let binned = state.registry.bind("binned", &hash, owner).await.unwrap();
    state.lifecycle.soft_delete(binned.id, owner).await.unwrap();

    let outcome = state.lifecycle.purge(live.id, owner).await.unwrap();

    assert!(outcome.artifact_removed);
    assert!(store.keys_with_prefix(&hash).await.is_empty());
    // the binned sibling goes with its artifact
    assert!(state.registry.list_bin(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_keeps_unrelated_artifacts() {
    let (state, store) = memory_state().await;
    let kept_raw = build_zip(&[("index.html", INDEX_HTML), ("a.txt", b"a")]);
    let kept = digest(&kept_raw);
    state.ingest.ingest(kept_raw, &kept).await.unwrap();
    let gone = ingested(&state).await;
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("short-lived", &gone, owner).await.unwrap();

    state.lifecycle.purge(deployment.id, owner).await.unwrap();

    assert_eq!(store.keys_with_prefix(&kept).await.len(), 2);
    assert_eq!(state.artifacts.count().await.unwrap(), 1);
}

#[tokio::test]
async fn reingest_during_purge_never_leaves_an_empty_artifact() {
    let store = GatedStore::default();
    let state = state_with(Arc::new(store.clone()), &AppConfig::default()).await;
    let raw = site_zip();
    let hash = digest(&raw);
    state.ingest.ingest(raw.clone(), &hash).await.unwrap();
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("racy", &hash, owner).await.unwrap();

    let purge = tokio::spawn({
        let state = state.clone();
        async move { state.lifecycle.purge(deployment.id, owner).await }
    });
    store.entered.notified().await;

    // objects are being removed; the artifact row is still there
    let during = state.ingest.ingest(raw.clone(), &hash).await.unwrap();
    assert_eq!(during.status, IngestStatus::AlreadyExisted);

    store.release.notify_one();
    let outcome = purge.await.unwrap().unwrap();
    assert!(outcome.artifact_removed);
    assert!(state.artifacts.find_by_hash(&hash).await.unwrap().is_none());
    assert!(store.inner.keys_with_prefix(&hash).await.is_empty());

    // the next upload of the same bytes repopulates everything
    let after = state.ingest.ingest(raw, &hash).await.unwrap();
    assert_eq!(after.status, IngestStatus::Created);
    assert_eq!(store.inner.keys_with_prefix(&hash).await.len(), 3);
}
