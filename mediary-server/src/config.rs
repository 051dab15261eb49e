use mediary_core::{
    AssetRegistry, BlobStore, KeyDeriver, MediaError, ObjectBlobStore, Result,
    S3BlobStoreConfig, SqliteMetadataIndex,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Shared bearer token required for uploads and deletes.
    pub auth_token: String,
    pub index: IndexConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub public_base_url: String,
    pub s3: Option<S3Config>,
    pub local: Option<LocalConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores such as R2 or MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub credentials: S3Credentials,
}

fn default_s3_region() -> String {
    "auto".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/svg+xml",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("MEDIARY").separator("__"))
            .build()
            .map_err(|e| MediaError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| MediaError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(MediaError::Config("auth_token cannot be empty".to_string()));
        }

        if self.upload.max_bytes == 0 {
            return Err(MediaError::Config(
                "upload.max_bytes must be positive".to_string(),
            ));
        }

        match self.storage.backend {
            StorageBackend::S3 if self.storage.s3.is_none() => Err(MediaError::Config(
                "s3 configuration is required for s3 backend".to_string(),
            )),
            StorageBackend::Local if self.storage.local.is_none() => Err(MediaError::Config(
                "local configuration is required for local backend".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn build_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        let store = match self.storage.backend {
            StorageBackend::S3 => {
                let s3 = self.storage.s3.as_ref().ok_or_else(|| {
                    MediaError::Config("s3 configuration is required for s3 backend".to_string())
                })?;
                ObjectBlobStore::s3(&S3BlobStoreConfig {
                    bucket: s3.bucket.clone(),
                    region: s3.region.clone(),
                    endpoint: s3.endpoint.clone(),
                    access_key_id: s3.credentials.access_key_id.clone(),
                    secret_access_key: s3.credentials.secret_access_key.clone(),
                })?
            }
            StorageBackend::Local => {
                let local = self.storage.local.as_ref().ok_or_else(|| {
                    MediaError::Config(
                        "local configuration is required for local backend".to_string(),
                    )
                })?;
                ObjectBlobStore::local(local.root.clone())?
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory blob store; blobs are lost on restart");
                ObjectBlobStore::in_memory()
            }
        };

        Ok(Arc::new(store))
    }

    pub fn build_registry(&self) -> Result<AssetRegistry> {
        let keys = KeyDeriver::new(self.storage.public_base_url.clone())?;
        let blob_store = self.build_blob_store()?;
        let index = Arc::new(SqliteMetadataIndex::open(&self.index.path)?);

        Ok(AssetRegistry::new(blob_store, index, keys))
    }
}
