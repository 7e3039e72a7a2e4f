//! Object store seam.
//!
//! A narrow put/get/remove interface over a blob backend. Keys are
//! `<artifact hash>/<relative path>`; the first segment is the namespace that
//! `remove_prefix` reclaims in one call. No business logic lives here.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::RwLock,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object `{0}` already exists")]
    AlreadyExists(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Write a new object. Never overwrites: an existing key yields
    /// `AlreadyExists`.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<()>;

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes>;

    /// Remove every object under `prefix/`. Returns how many were removed
    /// when the backend can tell.
    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize>;

    /// Cheap readiness check.
    async fn probe(&self) -> ObjectStoreResult<()>;
}

/// Reject keys that could escape the namespace layout.
///
/// Keys must have at least two segments, no empty, `.` or `..` segments, no
/// backslashes and no control bytes.
pub fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
    let invalid = || ObjectStoreError::InvalidKey(key.to_string());
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(invalid());
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(invalid());
    }
    let mut segments = 0;
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
        segments += 1;
    }
    if segments < 2 {
        return Err(invalid());
    }
    Ok(())
}

fn ensure_prefix_safe(prefix: &str) -> ObjectStoreResult<()> {
    if prefix.is_empty()
        || prefix.contains('/')
        || prefix == "."
        || prefix == ".."
        || prefix.bytes().any(|b| b.is_ascii_control() || b == b'\\')
    {
        return Err(ObjectStoreError::InvalidKey(prefix.to_string()));
    }
    Ok(())
}

/// Disk-backed store sharded beneath `base/{shard}/{shard}/{namespace}/{path}`.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Two-level shard identifiers for a namespace.
    ///
    /// Uses MD5(namespace) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Reduces entries per directory.
    fn shards(namespace: &str) -> (String, String) {
        let digest = md5::compute(namespace);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn namespace_root(&self, namespace: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(namespace);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(namespace);
        path
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (namespace, rest) = key.split_once('/').unwrap_or((key, ""));
        let mut path = self.namespace_root(namespace);
        for segment in rest.split('/') {
            path.push(segment);
        }
        path
    }

    /// Remove empty directories from `start` up to, but excluding, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    /// Write to a temporary file, fsync, then hard-link it into place. The
    /// link fails when the destination exists, so concurrent writers of one
    /// key see exactly one success.
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> ObjectStoreResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        if fs::try_exists(&file_path).await? {
            return Err(ObjectStoreError::AlreadyExists(key.to_string()));
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        let linked = fs::hard_link(&tmp_path, &file_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        match linked {
            Ok(()) => {
                debug!(key, bytes = data.len(), "stored object");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::AlreadyExists(key.to_string()))
            }
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        ensure_key_safe(key)?;
        match fs::read(self.object_path(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::IsADirectory => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize> {
        ensure_prefix_safe(prefix)?;
        let root = self.namespace_root(prefix);
        let removed = count_files(&root).await?;
        match fs::remove_dir_all(&root).await {
            Ok(_) => debug!("removed namespace {}", root.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("namespace {} already missing", root.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }
        if let Some(parent) = root.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(removed)
    }

    /// Best-effort write/read/delete of a temp file under the base path.
    async fn probe(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }
}

/// Count regular files beneath `root`; zero when it does not exist.
async fn count_files(root: &Path) -> io::Result<usize> {
    let mut pending = vec![root.to_path_buf()];
    let mut count = 0;
    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                count += 1;
            }
        }
    }
    Ok(count)
}

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
}

/// In-memory store keyed by full object key.
///
/// BTreeMap keeps keys ordered so a namespace is a contiguous range.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
    puts: Arc<AtomicUsize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Keys currently stored under `prefix/`.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let namespace = format!("{}/", prefix);
        self.objects
            .read()
            .await
            .range(namespace.clone()..)
            .take_while(|(key, _)| key.starts_with(&namespace))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<()> {
        ensure_key_safe(key)?;
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(ObjectStoreError::AlreadyExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        ensure_key_safe(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize> {
        ensure_prefix_safe(prefix)?;
        let namespace = format!("{}/", prefix);
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(&namespace));
        Ok(before - objects.len())
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}
