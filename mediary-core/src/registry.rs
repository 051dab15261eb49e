use crate::{
    BlobStore, CreateAssetOperation, CreateAssetOperationRequest, CreateAssetOperationResult,
    DeleteAssetOperation, DeleteAssetOperationRequest, DeleteAssetOperationResult, KeyDeriver,
    ListAssetsOperation, ListAssetsOperationRequest, ListAssetsOperationResult, MetadataIndex,
    ReconcileOperation, ReconcileOperationRequest, ReconcileReport, Result,
};
use std::sync::Arc;

/// Entry point composing the key deriver and both stores.
///
/// Holds no mutable state of its own; clones share the underlying stores.
#[derive(Clone)]
pub struct AssetRegistry {
    keys: KeyDeriver,
    create: CreateAssetOperation,
    list: ListAssetsOperation,
    delete: DeleteAssetOperation,
    reconcile: ReconcileOperation,
}

impl AssetRegistry {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index: Arc<dyn MetadataIndex>,
        keys: KeyDeriver,
    ) -> Self {
        Self {
            create: CreateAssetOperation::new(blob_store.clone(), index.clone(), keys.clone()),
            list: ListAssetsOperation::new(index.clone()),
            delete: DeleteAssetOperation::new(blob_store.clone(), index.clone(), keys.clone()),
            reconcile: ReconcileOperation::new(blob_store, index, keys.clone()),
            keys,
        }
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    pub async fn create(
        &self,
        request: CreateAssetOperationRequest,
    ) -> Result<CreateAssetOperationResult> {
        self.create.run(request).await
    }

    pub async fn list(
        &self,
        request: ListAssetsOperationRequest,
    ) -> Result<ListAssetsOperationResult> {
        self.list.run(request).await
    }

    pub async fn delete(
        &self,
        request: DeleteAssetOperationRequest,
    ) -> Result<DeleteAssetOperationResult> {
        self.delete.run(request).await
    }

    pub async fn reconcile(&self, request: ReconcileOperationRequest) -> Result<ReconcileReport> {
        self.reconcile.run(request).await
    }
}
