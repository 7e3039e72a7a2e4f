//! HTTP handlers. Each one is a thin adapter: extract, delegate to a
//! service, shape the JSON or asset response.

pub mod artifact_handlers;
pub mod caller;
pub mod deployment_handlers;
pub mod health_handlers;
pub mod serve_handlers;
