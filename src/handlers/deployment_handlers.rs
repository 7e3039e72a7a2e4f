//! Deployment binding, listing and lifecycle handlers.
//!
//! All routes are scoped to the caller's own deployments.

use crate::{
    errors::{AppError, ServiceError},
    handlers::caller::CallerId,
    models::deployment::{Deployment, DeploymentStatus, DeploymentSummary},
    services::lifecycle::PurgeOutcome,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/deploy`.
#[derive(Debug, Deserialize)]
pub struct CreateDeploymentReq {
    /// Desired name; free text, normalized server side.
    #[serde(alias = "url", alias = "site_name")]
    pub name: String,
    pub artifact_hash: String,
}

/// Body of `PATCH /api/deployments/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateDeploymentReq {
    pub action: String,
}

/// Listing row as returned to clients.
#[derive(Debug, Serialize)]
pub struct DeploymentView {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub access_url: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub artifact_hash: String,
    pub size_bytes: i64,
    pub file_count: i64,
}

#[derive(Serialize)]
struct DeploymentResponse {
    success: bool,
    deployment: Deployment,
    access_url: String,
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    count: usize,
    deployments: Vec<DeploymentView>,
}

#[derive(Serialize)]
struct PurgeResponse {
    success: bool,
    message: &'static str,
    #[serde(flatten)]
    outcome: PurgeOutcome,
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| ServiceError::InvalidInput(format!("malformed deployment id `{}`", raw)).into())
}

fn to_view(state: &AppState, row: DeploymentSummary) -> DeploymentView {
    DeploymentView {
        id: row.id,
        display_name: state.registry.display_name(&row.name).to_string(),
        access_url: state.resolver.access_url(&row.name),
        name: row.name,
        status: row.status,
        created_at: row.created_at,
        deleted_at: row.deleted_at,
        artifact_hash: row.artifact_hash,
        size_bytes: row.size_bytes,
        file_count: row.file_count,
    }
}

fn deployment_response(state: &AppState, deployment: Deployment) -> Json<DeploymentResponse> {
    let access_url = state.resolver.access_url(&deployment.name);
    Json(DeploymentResponse {
        success: true,
        deployment,
        access_url,
    })
}

/// `POST /api/deploy`: bind a name to an artifact.
pub async fn create_deployment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(req): Json<CreateDeploymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let artifact_hash = crate::services::hasher::parse_digest(&req.artifact_hash)?;
    let deployment = state
        .registry
        .bind(&req.name, &artifact_hash, caller)
        .await?;
    Ok((StatusCode::CREATED, deployment_response(&state, deployment)))
}

/// `GET /api/deployments`: the caller's live deployments.
pub async fn list_deployments(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.registry.list_active(caller).await?;
    let deployments: Vec<_> = rows.into_iter().map(|row| to_view(&state, row)).collect();
    Ok(Json(ListResponse {
        success: true,
        count: deployments.len(),
        deployments,
    }))
}

/// `PATCH /api/deployments/{id}`: `{"action": "soft-delete"}` moves it to the bin.
pub async fn update_deployment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
    Json(req): Json<UpdateDeploymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    match req.action.as_str() {
        "soft-delete" => {
            let deployment = state.lifecycle.soft_delete(id, caller).await?;
            Ok(deployment_response(&state, deployment))
        }
        other => Err(AppError::bad_request(format!("unknown action `{}`", other))),
    }
}

/// `GET /api/bin`: the caller's soft-deleted deployments.
pub async fn list_bin(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.registry.list_bin(caller).await?;
    let deployments: Vec<_> = rows.into_iter().map(|row| to_view(&state, row)).collect();
    Ok(Json(ListResponse {
        success: true,
        count: deployments.len(),
        deployments,
    }))
}

/// `POST /api/bin/{id}/restore`
pub async fn restore_deployment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let deployment = state.lifecycle.restore(id, caller).await?;
    Ok(deployment_response(&state, deployment))
}

/// `DELETE /api/bin/{id}`: permanent deletion.
pub async fn purge_deployment(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let outcome = state.lifecycle.purge(id, caller).await?;
    Ok(Json(PurgeResponse {
        success: true,
        message: "deployment permanently deleted",
        outcome,
    }))
}
