use crate::error::{MediaError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::path::PathBuf;
use std::sync::Arc;

/// Byte storage for asset payloads, addressed by derived key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Keys stored under `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct S3BlobStoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// [`BlobStore`] over any `object_store` backend.
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    // LocalFileSystem rejects puts that carry attributes.
    store_content_type: bool,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            store_content_type: true,
        }
    }

    pub fn s3(config: &S3BlobStoreConfig) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(MediaError::Config("s3 bucket cannot be empty".to_string()));
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| MediaError::Config(format!("failed to build s3 store: {}", e)))?;

        tracing::info!(
            "Using s3 blob store bucket={} region={}",
            config.bucket,
            config.region
        );
        Ok(Self::new(Arc::new(store)))
    }

    pub fn local(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| MediaError::Config(format!("failed to open local store: {}", e)))?;

        tracing::info!("Using local blob store at {:?}", root);
        Ok(Self {
            store: Arc::new(store),
            store_content_type: false,
        })
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }
}

fn object_path(key: &str) -> Result<ObjectPath> {
    ObjectPath::parse(key)
        .map_err(|e| MediaError::InvalidInput(format!("invalid blob key {}: {}", key, e)))
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let path = object_path(key)?;

        let mut options = PutOptions::default();
        if self.store_content_type {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            options.attributes = attributes;
        }

        let size = body.len();
        self.store
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(|e| MediaError::BlobWriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Stored blob {} ({} bytes, {})", key, size, content_type);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = object_path(key)?;

        match self.store.delete(&path).await {
            Ok(()) => {}
            // Deleting an absent key is already the desired end state.
            Err(object_store::Error::NotFound { .. }) => {
                tracing::debug!("Blob {} already absent", key);
            }
            Err(e) => {
                return Err(MediaError::BlobDeleteFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        tracing::debug!("Deleted blob {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = object_path(key)?;

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => MediaError::NotFound(key.to_string()),
            other => MediaError::Internal(format!("blob read failed for {}: {}", key, other)),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| MediaError::Internal(format!("blob read failed for {}: {}", key, e)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = object_path(prefix)?;

        let metas: Vec<object_store::ObjectMeta> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| MediaError::Internal(format!("blob listing failed: {}", e)))?;

        Ok(metas
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }
}
