use crate::{Asset, BlobStore, KeyDeriver, MediaError, MetadataIndex, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteAssetOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    keys: KeyDeriver,
}

#[derive(Debug, Clone)]
pub struct DeleteAssetOperationRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct DeleteAssetOperationResult {
    pub asset: Asset,
    pub key: String,
}

impl DeleteAssetOperation {
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

    /// Blob first, then record. A failed blob delete leaves the record in place.
    pub async fn run(
        &self,
        request: DeleteAssetOperationRequest,
    ) -> Result<DeleteAssetOperationResult> {
        let asset = self.index.get(&request.id)?;

        let key = self.keys.key_for_url(&asset.url).ok_or_else(|| {
            MediaError::Internal(format!(
                "asset {} url {} is outside the configured public base url",
                asset.id, asset.url
            ))
        })?;

        self.blob_store.delete(&key).await?;

        if let Err(error) = self.index.delete(&asset.id) {
            tracing::warn!(
                "blob deleted but index delete failed, record is dangling. id={} key={} error={}",
                asset.id,
                key,
                error
            );
            return Err(error);
        }

        tracing::info!("deleted asset id={} key={}", asset.id, key);
        Ok(DeleteAssetOperationResult { asset, key })
    }
}
