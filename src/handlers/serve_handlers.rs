//! Unauthenticated serving of deployed assets.

use crate::{errors::AppError, services::resolver::ResolvedAsset, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};

/// `GET /{mount}/{name}`: the deployment's index document.
pub async fn serve_root(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let asset = state.resolver.resolve(&name, "").await?;
    Ok(asset_response(asset))
}

/// `GET /{mount}/{name}/{*path}`
pub async fn serve_path(
    State(state): State<AppState>,
    Path((name, path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let asset = state.resolver.resolve(&name, &path).await?;
    Ok(asset_response(asset))
}

fn asset_response(asset: ResolvedAsset) -> Response {
    let mut response = Response::new(Body::from(asset.body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&asset.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(asset.cache.header_value()),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
