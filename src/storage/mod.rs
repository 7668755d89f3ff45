//! Object storage for finished bags
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, WriteMultipart, path::Path as StoragePath};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::config::{StorageConfig, StorageProvider};

/// Parts in flight during a multipart upload
const MAX_CONCURRENT_PARTS: usize = 4;
const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed for {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    #[error("Storage configuration invalid: {0}")]
    InvalidConfig(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Byte counter shared with the upload loop
#[derive(Debug)]
pub struct ProgressTracker {
    key: String,
    total: u64,
    seen: Mutex<u64>,
}

impl ProgressTracker {
    pub fn new(key: impl Into<String>, total: u64) -> Self {
        Self {
            key: key.into(),
            total,
            seen: Mutex::new(0),
        }
    }

    /// Add `bytes` and return the running total
    pub fn record(&self, bytes: u64) -> u64 {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *seen += bytes;
        let percent = if self.total == 0 {
            100.0
        } else {
            (*seen as f64 / self.total as f64) * 100.0
        };
        tracing::debug!(
            key = %self.key,
            seen = *seen,
            total = self.total,
            "Upload progress {percent:.2}%"
        );
        *seen
    }

    pub fn seen(&self) -> u64 {
        *self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    part_size: usize,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        Self {
            store,
            bucket,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "archiver-local".to_string())
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Build the backend named by the configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.provider {
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                match (&config.access_key, &config.secret_key) {
                    (Some(access_key), Some(secret_key)) => {
                        builder = builder
                            .with_access_key_id(access_key)
                            .with_secret_access_key(secret_key);
                    }
                    (None, None) => {}
                    _ => {
                        return Err(StorageError::InvalidConfig(
                            "both S3 access and secret keys are required".to_string(),
                        ));
                    }
                }
                Arc::new(builder.build()?)
            }
            StorageProvider::Local => {
                let root = config.root.join(&config.bucket);
                std::fs::create_dir_all(&root)?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            StorageProvider::Memory => Arc::new(InMemory::new()),
        };

        let part_size = usize::try_from(config.part_size.as_u64()).unwrap_or(DEFAULT_PART_SIZE);
        Ok(Self::new(store, config.bucket.clone()).with_part_size(part_size))
    }

    /// Stream a local file to `key` as a multipart upload
    ///
    /// `progress` receives the size of each chunk handed to the uploader.
    pub async fn upload_file<F>(&self, local: &Path, key: &str, progress: F) -> Result<UploadMetadata>
    where
        F: Fn(u64),
    {
        let path = StoragePath::from(key);
        let mut file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();

        let upload = self.store.put_multipart(&path).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.part_size);
        let mut buf = vec![0u8; self.part_size];

        loop {
            let n = match file.read(&mut buf).await {
                Ok(n) => n,
                Err(err) => {
                    let _ = writer.abort().await;
                    return Err(err.into());
                }
            };
            if n == 0 {
                break;
            }
            if let Err(err) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                let _ = writer.abort().await;
                return Err(StorageError::UploadFailed {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
            }
            writer.write(&buf[..n]);
            progress(n as u64);
        }

        let put_result = writer
            .finish()
            .await
            .map_err(|err| StorageError::UploadFailed {
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        tracing::info!(bucket = %self.bucket, key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);
        let result = self.store.get(&path).await?;
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(bytes)
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
