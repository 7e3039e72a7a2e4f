//! Core data models for the artifact host.
//!
//! Artifacts and deployments map to database tables via `sqlx::FromRow` and
//! serialize naturally as JSON via `serde`. `StoredFile` is the in-memory
//! product of archive validation and never touches the database.

pub mod artifact;
pub mod deployment;
pub mod stored_file;
