//! Caller identity for authenticated routes.
//!
//! Authentication happens upstream; the authenticating proxy forwards the
//! user's id in `x-user-id`.

use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const CALLER_HEADER: &str = "x-user-id";

/// The authenticated user issuing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing caller identity"))?;
        Uuid::parse_str(raw.trim())
            .map(CallerId)
            .map_err(|_| AppError::unauthorized("malformed caller identity"))
    }
}
