//! Ingestion pipeline: validate → hash → dedup-check → extract →
//! bounded-concurrency upload → record.
//!
//! Nothing durable happens until the idempotency check has come back empty
//! and the archive has passed integrity and validation checks. The artifact
//! row is written last, and only once at least one file is stored, so no
//! artifact ever references zero objects.

use crate::{
    config::ArchiveLimits,
    errors::{ServiceError, ServiceResult},
    models::{artifact::Artifact, stored_file::StoredFile},
    services::{
        archive::{self, ValidatedArchive},
        artifact_repository::{ArtifactRepository, InsertOutcome},
        hasher,
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use bytes::Bytes;
use futures::{StreamExt, stream::FuturesUnordered};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Whether this call created the artifact or found it already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Created,
    AlreadyExisted,
}

/// What was extracted and stored by an ingestion that did the work.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub files_stored: usize,
    pub files_failed: usize,
    pub extracted_bytes: u64,
    pub entry_point: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub artifact: Artifact,
    pub status: IngestStatus,
    /// Absent when the artifact already existed before extraction began.
    pub summary: Option<IngestSummary>,
}

#[derive(Clone)]
pub struct IngestPipeline {
    artifacts: ArtifactRepository,
    store: Arc<dyn ObjectStore>,
    limits: ArchiveLimits,
    upload_concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        artifacts: ArtifactRepository,
        store: Arc<dyn ObjectStore>,
        limits: ArchiveLimits,
        upload_concurrency: usize,
    ) -> Self {
        Self {
            artifacts,
            store,
            limits,
            upload_concurrency: upload_concurrency.max(1),
        }
    }

    /// Ingest `raw` whose SHA-256 the caller claims is `claimed_digest`.
    pub async fn ingest(&self, raw: Bytes, claimed_digest: &str) -> ServiceResult<IngestOutcome> {
        let hash = hasher::parse_digest(claimed_digest)?;

        if let Some(existing) = self.artifacts.find_by_hash(&hash).await? {
            debug!(hash = %hash, "artifact already exists, skipping extraction");
            return Ok(IngestOutcome {
                artifact: existing,
                status: IngestStatus::AlreadyExisted,
                summary: None,
            });
        }

        let raw_size = raw.len() as i64;
        let limits = self.limits;
        let claimed = hash.clone();
        let validated = tokio::task::spawn_blocking(move || -> ServiceResult<ValidatedArchive> {
            hasher::verify(&raw, &claimed)?;
            archive::validate_archive(&raw, &limits)
        })
        .await
        .map_err(|err| ServiceError::Storage(format!("archive worker failed: {}", err)))??;

        info!(
            hash = %hash,
            files = validated.files.len(),
            extracted_bytes = validated.extracted_bytes,
            entry_point = %validated.entry_point,
            "archive validated"
        );

        let ValidatedArchive {
            files,
            entry_point,
            extracted_bytes,
            mut warnings,
            ..
        } = validated;
        let total_files = files.len();

        let failures = self.upload_all(&hash, files).await;
        let stored = total_files - failures.len();
        if stored == 0 {
            warn!(hash = %hash, "no files could be stored");
            return Err(ServiceError::Storage(format!(
                "failed to store any of {} files: {}",
                total_files,
                failures.join("; ")
            )));
        }
        if !failures.is_empty() {
            warn!(hash = %hash, failed = failures.len(), stored, "partial upload");
        }
        warnings.extend(failures.iter().map(|f| format!("upload failed: {}", f)));

        debug!(hash = %hash, raw_size, "recording artifact");
        let outcome = self
            .artifacts
            .insert(&hash, raw_size, stored as i64)
            .await?;
        let status = match outcome {
            InsertOutcome::Created(_) => IngestStatus::Created,
            InsertOutcome::AlreadyExisted(_) => IngestStatus::AlreadyExisted,
        };
        info!(hash = %hash, ?status, files = stored, "artifact recorded");

        Ok(IngestOutcome {
            artifact: outcome.into_artifact(),
            status,
            summary: Some(IngestSummary {
                files_stored: stored,
                files_failed: failures.len(),
                extracted_bytes,
                entry_point,
                warnings,
            }),
        })
    }

    /// Upload every file under `<hash>/<path>` with at most
    /// `upload_concurrency` writes in flight. Returns per-file failures;
    /// `AlreadyExists` counts as success.
    async fn upload_all(&self, hash: &str, files: Vec<StoredFile>) -> Vec<String> {
        let permits = Arc::new(Semaphore::new(self.upload_concurrency));
        let mut uploads = FuturesUnordered::new();

        for file in files {
            let permits = Arc::clone(&permits);
            let store = Arc::clone(&self.store);
            let key = format!("{}/{}", hash, file.path);
            uploads.push(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|err| format!("{}: {}", file.path, err))?;
                match store.put(&key, file.data, file.content_type).await {
                    Ok(()) => {
                        debug!(key = %key, "uploaded");
                        Ok(())
                    }
                    Err(ObjectStoreError::AlreadyExists(_)) => {
                        debug!(key = %key, "already present");
                        Ok(())
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "upload failed");
                        Err(format!("{}: {}", file.path, err))
                    }
                }
            });
        }

        let mut failures = Vec::new();
        while let Some(result) = uploads.next().await {
            if let Err(failure) = result {
                failures.push(failure);
            }
        }
        failures
    }
}
