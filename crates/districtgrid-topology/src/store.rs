//! Object stores that region files are read from.
//!
//! Region prefixes may point at local directories, plain HTTPS hosts or
//! public S3 buckets. `SourceStore` picks the backend from the URI scheme.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use district_core::SourceUri;

use crate::error::{StoreError, StoreResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to region files by URI.
pub trait ObjectStore: Send + Sync {
    fn get<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, StoreResult<Bytes>>;
}

/// Reads `file://` URIs and bare paths from the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FileStore;

impl FileStore {
    async fn read(&self, uri: &str) -> StoreResult<Bytes> {
        let SourceUri::File { path } = SourceUri::parse(uri)? else {
            return Err(StoreError::Request {
                uri: uri.to_string(),
                message: "not a file URI".into(),
            });
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(uri.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ObjectStore for FileStore {
    fn get<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(self.read(uri))
    }
}

/// Fetches HTTPS URLs and public S3 objects (virtual-hosted style).
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(timeout: Duration) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request {
                uri: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn fetch(&self, uri: &str) -> StoreResult<Bytes> {
        let source = SourceUri::parse(uri)?;
        let url = source.http_url().ok_or_else(|| StoreError::Request {
            uri: uri.to_string(),
            message: format!("{} sources are not fetched over HTTP", source.scheme()),
        })?;

        debug!(%url, "fetching region object");
        let request_error = |e: reqwest::Error| StoreError::Request {
            uri: uri.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(&url).send().await.map_err(request_error)?;

        let status = response.status();
        // Unauthenticated S3 answers 403 for keys that do not exist.
        if status == reqwest::StatusCode::NOT_FOUND
            || (status == reqwest::StatusCode::FORBIDDEN && source.scheme() == "s3")
        {
            return Err(StoreError::NotFound(uri.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Request {
                uri: uri.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        response.bytes().await.map_err(request_error)
    }
}

impl ObjectStore for HttpStore {
    fn get<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(self.fetch(uri))
    }
}

/// Dispatches to the file or HTTP backend based on the URI scheme.
#[derive(Debug, Clone)]
pub struct SourceStore {
    file: FileStore,
    http: HttpStore,
}

impl SourceStore {
    pub fn new(request_timeout: Duration) -> StoreResult<Self> {
        Ok(Self {
            file: FileStore,
            http: HttpStore::new(request_timeout)?,
        })
    }
}

impl ObjectStore for SourceStore {
    fn get<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            match SourceUri::parse(uri)? {
                SourceUri::File { .. } => self.file.read(uri).await,
                SourceUri::Https { .. } | SourceUri::S3 { .. } => self.http.fetch(uri).await,
            }
        })
    }
}

/// In-memory store for tests and fixtures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    // uri -> number of upcoming requests that fail
    failures: Mutex<HashMap<String, usize>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, data: impl Into<Bytes>) {
        lock(&self.objects).insert(uri.into(), data.into());
    }

    /// Make the next `count` requests for `uri` fail.
    pub fn fail_next(&self, uri: impl Into<String>, count: usize) {
        lock(&self.failures).insert(uri.into(), count);
    }

    /// Number of requests seen for `uri`, failed ones included.
    pub fn request_count(&self, uri: &str) -> usize {
        lock(&self.requests).get(uri).copied().unwrap_or(0)
    }
}

impl ObjectStore for MemoryStore {
    fn get<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            *lock(&self.requests).entry(uri.to_string()).or_insert(0) += 1;

            if let Some(remaining) = lock(&self.failures).get_mut(uri) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Request {
                        uri: uri.to_string(),
                        message: "injected failure".into(),
                    });
                }
            }

            lock(&self.objects)
                .get(uri)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(uri.to_string()))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_serves_inserted_objects() {
        let store = MemoryStore::new();
        store.insert("s3://bucket/PA/topo.json", Bytes::from_static(b"{}"));

        let data = store.get("s3://bucket/PA/topo.json").await.unwrap();
        assert_eq!(&data[..], b"{}");
        assert!(matches!(
            store.get("s3://bucket/PA/missing.json").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.request_count("s3://bucket/PA/topo.json"), 1);
    }

    #[tokio::test]
    async fn memory_store_injected_failures_run_out() {
        let store = MemoryStore::new();
        store.insert("mem://a", Bytes::from_static(b"x"));
        store.fail_next("mem://a", 2);

        assert!(store.get("mem://a").await.is_err());
        assert!(store.get("mem://a").await.is_err());
        assert!(store.get("mem://a").await.is_ok());
        assert_eq!(store.request_count("mem://a"), 3);
    }

    #[tokio::test]
    async fn file_store_reads_local_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static-metadata.json");
        std::fs::write(&path, b"{\"a\":1}").unwrap();

        let uri = format!("file://{}", path.display());
        let data = FileStore.get(&uri).await.unwrap();
        assert_eq!(&data[..], b"{\"a\":1}");

        let missing = format!("file://{}", dir.path().join("nope").display());
        assert!(matches!(
            FileStore.get(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn source_store_rejects_unknown_schemes() {
        let store = SourceStore::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            store.get("ftp://host/topo.json").await,
            Err(StoreError::Source(_))
        ));
    }
}
