//! Artifact ingestion endpoint.

use crate::{
    errors::AppError,
    handlers::caller::CallerId,
    services::ingest::{IngestOutcome, IngestStatus},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;

#[derive(Serialize)]
struct IngestResponse {
    success: bool,
    message: &'static str,
    #[serde(flatten)]
    outcome: IngestOutcome,
}

/// `POST /api/artifacts`: multipart with an `archive` file and its `hash`.
///
/// Responds 201 when the artifact was created by this call, 200 when it
/// already existed.
pub async fn create_artifact(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut archive: Option<Bytes> = None;
    let mut hash: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {}", err)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("archive") | Some("zip") => {
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read archive: {}", err))
                })?;
                archive = Some(bytes);
            }
            Some("hash") => {
                let text = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read hash: {}", err))
                })?;
                hash = Some(text);
            }
            _ => {}
        }
    }

    let (Some(archive), Some(hash)) = (archive, hash) else {
        return Err(AppError::bad_request("archive file and hash are required"));
    };

    tracing::info!(caller = %caller, bytes = archive.len(), "artifact upload received");
    let outcome = state.ingest.ingest(archive, &hash).await?;

    let (status, message) = match outcome.status {
        IngestStatus::Created => (StatusCode::CREATED, "artifact created"),
        IngestStatus::AlreadyExisted => (StatusCode::OK, "artifact already exists"),
    };
    Ok((
        status,
        Json(IngestResponse {
            success: true,
            message,
            outcome,
        }),
    )
        .into_response())
}
