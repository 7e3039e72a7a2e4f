//! Artifact records keyed by content hash.

use crate::{errors::ServiceResult, models::artifact::Artifact};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::sync::Arc;

/// Result of recording an artifact. A concurrent ingestion of the same
/// bytes may win the insert; the loser sees `AlreadyExisted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Artifact),
    AlreadyExisted(Artifact),
}

impl InsertOutcome {
    pub fn artifact(&self) -> &Artifact {
        match self {
            Self::Created(artifact) | Self::AlreadyExisted(artifact) => artifact,
        }
    }

    pub fn into_artifact(self) -> Artifact {
        match self {
            Self::Created(artifact) | Self::AlreadyExisted(artifact) => artifact,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Clone)]
pub struct ArtifactRepository {
    db: Arc<SqlitePool>,
}

impl ArtifactRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn find_by_hash(&self, hash: &str) -> ServiceResult<Option<Artifact>> {
        let artifact = sqlx::query_as::<_, Artifact>(
            "SELECT hash, size_bytes, file_count, created_at FROM artifacts WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&*self.db)
        .await?;
        Ok(artifact)
    }

    /// Insert a new artifact row. A unique violation on `hash` is not an
    /// error: the existing row is returned instead.
    pub async fn insert(
        &self,
        hash: &str,
        size_bytes: i64,
        file_count: i64,
    ) -> ServiceResult<InsertOutcome> {
        let artifact = Artifact {
            hash: hash.to_string(),
            size_bytes,
            file_count,
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO artifacts (hash, size_bytes, file_count, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&artifact.hash)
        .bind(artifact.size_bytes)
        .bind(artifact.file_count)
        .bind(artifact.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => Ok(InsertOutcome::Created(artifact)),
            Err(err) if is_unique_violation(&err) => {
                let existing = self.find_by_hash(hash).await?.ok_or(err)?;
                Ok(InsertOutcome::AlreadyExisted(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete an artifact row. Returns whether a row was removed.
    pub async fn delete<'e, E>(executor: E, hash: &str) -> ServiceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM artifacts WHERE hash = ?")
            .bind(hash)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM artifacts")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
