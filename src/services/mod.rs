//! Domain services. Each one is cheap to clone and shares the SQLite pool
//! and object store through `Arc`s.

pub mod archive;
pub mod artifact_repository;
pub mod content_type;
pub mod deployment_registry;
pub mod hasher;
pub mod ingest;
pub mod lifecycle;
pub mod object_store;
pub mod resolver;
