#![allow(dead_code)]

use artifact_host::{
    config::AppConfig,
    db,
    services::{
        hasher,
        object_store::{InMemoryObjectStore, ObjectStore, ObjectStoreError, ObjectStoreResult},
    },
    state::AppState,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{Cursor, Write},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Notify;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const INDEX_HTML: &[u8] =
    b"<!DOCTYPE html><html><head><title>t</title></head><body>hello</body></html>";

pub fn build_zip(entries: &[(&str, &[u8])]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

/// A small site: index, stylesheet, script.
pub fn site_zip() -> Bytes {
    build_zip(&[
        ("index.html", INDEX_HTML),
        ("css/app.css", b"body { color: red; }"),
        ("js/app.js", b"console.log('hi');"),
    ])
}

pub fn digest(bytes: &[u8]) -> String {
    hasher::digest_hex(bytes)
}

pub async fn state_with(store: Arc<dyn ObjectStore>, cfg: &AppConfig) -> AppState {
    let pool = db::connect_in_memory().await.unwrap();
    AppState::new(Arc::new(pool), store, cfg)
}

pub async fn memory_state() -> (AppState, InMemoryObjectStore) {
    let store = InMemoryObjectStore::new();
    let state = state_with(Arc::new(store.clone()), &AppConfig::default()).await;
    (state, store)
}

/// Store whose writes fail for keys ending in one of `failing_suffixes`.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: InMemoryObjectStore,
    pub failing_suffixes: Vec<&'static str>,
}

impl FlakyStore {
    pub fn new(failing_suffixes: Vec<&'static str>) -> Self {
        Self {
            inner: InMemoryObjectStore::new(),
            failing_suffixes,
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<()> {
        if self.failing_suffixes.iter().any(|s| key.ends_with(s)) {
            return Err(ObjectStoreError::Io(std::io::Error::other("disk on fire")));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize> {
        self.inner.remove_prefix(prefix).await
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        self.inner.probe().await
    }
}

/// Store whose `remove_prefix` announces itself on `entered` and then waits
/// for `release` before removing anything.
#[derive(Clone, Default)]
pub struct GatedStore {
    pub inner: InMemoryObjectStore,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl ObjectStore for GatedStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<()> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.remove_prefix(prefix).await
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}

/// Store that records the highest number of `put` calls in flight at once.
#[derive(Clone, Default)]
pub struct PeakStore {
    pub inner: InMemoryObjectStore,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl PeakStore {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for PeakStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = self.inner.put(key, data, content_type).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> ObjectStoreResult<usize> {
        self.inner.remove_prefix(prefix).await
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}
