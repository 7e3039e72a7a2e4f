mod common;

use artifact_host::{errors::ServiceError, services::resolver::CacheDirective};
use common::{build_zip, digest, memory_state};
use uuid::Uuid;

const SPA_INDEX: &[u8] = b"<html><head><base href=\"/wrong/\"><title>app</title></head><body></body></html>";

async fn deployed_spa() -> artifact_host::state::AppState {
    let (state, _) = memory_state().await;
    let raw = build_zip(&[
        ("index.html", SPA_INDEX),
        ("assets/app.js", b"boot()"),
    ]);
    let hash = digest(&raw);
    state.ingest.ingest(raw, &hash).await.unwrap();
    state.registry.bind("spa", &hash, Uuid::new_v4()).await.unwrap();
    state
}

#[tokio::test]
async fn root_serves_index_with_base_href() {
    let state = deployed_spa().await;

    let asset = state.resolver.resolve("spa.site", "").await.unwrap();

    assert_eq!(asset.served_path, "index.html");
    assert!(!asset.fell_back);
    assert_eq!(asset.cache, CacheDirective::NoCache);
    assert!(asset.content_type.starts_with("text/html"));
    let html = String::from_utf8(asset.body.to_vec()).unwrap();
    assert!(html.contains("<head>\n<base href=\"/deploy/spa.site/\">"));
    assert!(!html.contains("/wrong/"));
}

#[tokio::test]
async fn unknown_paths_fall_back_to_index() {
    let state = deployed_spa().await;

    let asset = state.resolver.resolve("spa.site", "dashboard/settings").await.unwrap();

    assert!(asset.fell_back);
    assert_eq!(asset.served_path, "index.html");
    assert_eq!(asset.cache, CacheDirective::NoCache);
    assert!(String::from_utf8_lossy(&asset.body).contains("/deploy/spa.site/"));
}

#[tokio::test]
async fn assets_are_immutable_and_untouched() {
    let state = deployed_spa().await;

    let asset = state.resolver.resolve("spa.site", "/assets/app.js").await.unwrap();

    assert_eq!(&asset.body[..], b"boot()");
    assert_eq!(asset.cache, CacheDirective::Immutable);
    assert_eq!(asset.content_type, "application/javascript");
}

#[tokio::test]
async fn names_must_carry_suffix_and_be_ready() {
    let state = deployed_spa().await;

    let err = state.resolver.resolve("spa", "").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let err = state.resolver.resolve("missing.site", "").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn binned_deployments_are_not_served() {
    let (state, _) = memory_state().await;
    let raw = build_zip(&[("index.html", SPA_INDEX)]);
    let hash = digest(&raw);
    state.ingest.ingest(raw, &hash).await.unwrap();
    let owner = Uuid::new_v4();
    let deployment = state.registry.bind("hidden", &hash, owner).await.unwrap();

    state.lifecycle.soft_delete(deployment.id, owner).await.unwrap();
    let err = state.resolver.resolve("hidden.site", "").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    state.lifecycle.restore(deployment.id, owner).await.unwrap();
    assert!(state.resolver.resolve("hidden.site", "").await.is_ok());
}

#[tokio::test]
async fn traversal_is_rejected() {
    let state = deployed_spa().await;
    let err = state.resolver.resolve("spa.site", "../etc/passwd").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn trailing_slash_paths_fall_back_to_index() {
    let state = deployed_spa().await;

    let asset = state.resolver.resolve("spa.site", "about/").await.unwrap();
    assert!(asset.fell_back);
    assert_eq!(asset.served_path, "index.html");

    let asset = state.resolver.resolve("spa.site", "/").await.unwrap();
    assert!(!asset.fell_back);
    assert_eq!(asset.served_path, "index.html");
}
