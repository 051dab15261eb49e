use crate::{
    Asset, AssetKind, BlobStore, KeyDeriver, MediaError, MetadataIndex, NewAsset, Result,
    creation_timestamp,
};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct CreateAssetOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    keys: KeyDeriver,
}

#[derive(Debug, Clone)]
pub struct CreateAssetOperationRequest {
    pub kind: String,
    pub category: String,
    pub name: String,
    pub extension: String,
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct CreateAssetOperationResult {
    pub asset: Asset,
    pub key: String,
}

impl CreateAssetOperation {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index: Arc<dyn MetadataIndex>,
        keys: KeyDeriver,
    ) -> Self {
        Self {
            blob_store,
            index,
            keys,
        }
    }

    pub async fn run(
        &self,
        request: CreateAssetOperationRequest,
    ) -> Result<CreateAssetOperationResult> {
        let CreateAssetOperationRequest {
            kind,
            category,
            name,
            extension,
            body,
            content_type,
        } = request;

        let kind: AssetKind = kind.parse()?;
        if name.trim().is_empty() {
            return Err(MediaError::InvalidInput("name is required".to_string()));
        }
        if category.trim().is_empty() {
            return Err(MediaError::InvalidInput("category is required".to_string()));
        }

        let derived = self.keys.derive(kind, &category, &name, &extension)?;

        self.blob_store
            .put(&derived.key, body, &content_type)
            .await?;

        let draft = NewAsset {
            name,
            kind,
            category,
            url: derived.url,
            created_at: creation_timestamp(),
        };

        let asset = match self.index.insert(&draft) {
            Ok(asset) => asset,
            Err(error) => {
                tracing::warn!(
                    "index insert failed after blob write, blob is orphaned. key={} error={}",
                    derived.key,
                    error
                );
                return Err(error);
            }
        };

        tracing::info!(
            "created asset id={} key={} type={}",
            asset.id,
            derived.key,
            asset.kind
        );

        Ok(CreateAssetOperationResult {
            asset,
            key: derived.key,
        })
    }
}
