//! Defines routes for ingestion, deployment lifecycle and serving.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **Authenticated API** (caller id in `x-user-id`)
//!   - `POST   /api/artifacts`: upload archive (multipart `archive` + `hash`)
//!   - `POST   /api/deploy`: bind a name to an artifact
//!   - `GET    /api/deployments`: list live deployments
//!   - `PATCH  /api/deployments/{id}`: soft-delete
//!   - `GET    /api/bin`: list soft-deleted deployments
//!   - `POST   /api/bin/{id}/restore`: restore
//!   - `DELETE /api/bin/{id}`: purge
//!
//! - **Serving** (unauthenticated)
//!   - `GET    /{mount}/{name}` and `/{mount}/{name}/{*path}`

use crate::{
    handlers::{
        artifact_handlers::create_artifact,
        deployment_handlers::{
            create_deployment, list_bin, list_deployments, purge_deployment, restore_deployment,
            update_deployment,
        },
        health_handlers::{healthz, readyz},
        serve_handlers::{serve_path, serve_root},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};

/// Slack on top of the archive ceiling for multipart framing and the hash field.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router for all routes. `state` supplies the mount prefix and
/// upload ceiling; the caller attaches it with `with_state`.
pub fn routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.max_upload_bytes as usize + MULTIPART_OVERHEAD;
    let mount = state.resolver.mount_prefix();

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // API
        .route(
            "/api/artifacts",
            post(create_artifact).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/deploy", post(create_deployment))
        .route("/api/deployments", get(list_deployments))
        .route("/api/deployments/{id}", patch(update_deployment))
        .route("/api/bin", get(list_bin))
        .route("/api/bin/{id}", delete(purge_deployment))
        .route("/api/bin/{id}/restore", post(restore_deployment))
        // Serving
        .route(&format!("/{}/{{name}}", mount), get(serve_root))
        .route(&format!("/{}/{{name}}/", mount), get(serve_root))
        .route(&format!("/{}/{{name}}/{{*path}}", mount), get(serve_path))
}
