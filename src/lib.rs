//! Content-addressed static site host.
//!
//! Uploaded ZIP archives are validated, hashed and stored once per unique
//! SHA-256. Human-chosen deployment names are bound to those artifacts and
//! served under `/<mount>/<name>/`. Purging the last live deployment of an
//! artifact reclaims its storage.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
