//! Store doubles that fail on demand, for partial-failure tests.

use crate::{
    Asset, AssetFilter, AssetKind, AssetPage, AssetRegistry, AssetSort, BlobStore,
    CategoryCount, CreateAssetOperation, DeleteAssetOperation, KeyDeriver, ListAssetsOperation,
    MediaError, MetadataIndex, NewAsset, ObjectBlobStore, PageRequest, ReconcileOperation,
    Result, SqliteMetadataIndex,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct FlakyBlobStore {
    inner: ObjectBlobStore,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    puts: AtomicUsize,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self {
            inner: ObjectBlobStore::in_memory(),
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(MediaError::BlobWriteFailed {
                key: key.to_string(),
                reason: "injected".to_string(),
            });
        }
        self.inner.put(key, body, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MediaError::BlobDeleteFailed {
                key: key.to_string(),
                reason: "injected".to_string(),
            });
        }
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.inner.get(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }
}

pub struct FlakyIndex {
    inner: SqliteMetadataIndex,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
    pending_after_scan: Mutex<Option<NewAsset>>,
}

impl FlakyIndex {
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Insert `asset` right after the next `all_urls` call returns, as a
    /// concurrent Create would.
    pub fn insert_after_next_scan(&self, asset: NewAsset) {
        *self.pending_after_scan.lock().unwrap() = Some(asset);
    }
}

fn unavailable() -> MediaError {
    MediaError::StoreUnavailable("injected".to_string())
}

impl MetadataIndex for FlakyIndex {
    fn insert(&self, asset: &NewAsset) -> Result<Asset> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.insert(asset)
    }

    fn get(&self, id: &str) -> Result<Asset> {
        self.inner.get(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.delete(id)
    }

    fn query(
        &self,
        filter: &AssetFilter,
        sort: AssetSort,
        page: PageRequest,
    ) -> Result<AssetPage> {
        self.inner.query(filter, sort, page)
    }

    fn aggregate_by_category(&self, kinds: &[AssetKind]) -> Result<Vec<CategoryCount>> {
        self.inner.aggregate_by_category(kinds)
    }

    fn all_urls(&self) -> Result<Vec<(String, String)>> {
        let urls = self.inner.all_urls()?;
        if let Some(asset) = self.pending_after_scan.lock().unwrap().take() {
            self.inner.insert(&asset)?;
        }
        Ok(urls)
    }
}

pub const BASE_URL: &str = "https://cdn.example.com";

pub struct Fixture {
    pub blobs: Arc<FlakyBlobStore>,
    pub index: Arc<FlakyIndex>,
    pub keys: KeyDeriver,
    _dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let index = FlakyIndex {
            inner: SqliteMetadataIndex::open(dir.path().join("assets.db")).unwrap(),
            fail_inserts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            pending_after_scan: Mutex::new(None),
        };

        Self {
            blobs: Arc::new(FlakyBlobStore::new()),
            index: Arc::new(index),
            keys: KeyDeriver::new(BASE_URL).unwrap(),
            _dir: dir,
        }
    }

    pub fn create_operation(&self) -> CreateAssetOperation {
        CreateAssetOperation::new(self.blobs.clone(), self.index.clone(), self.keys.clone())
    }

    pub fn list_operation(&self) -> ListAssetsOperation {
        ListAssetsOperation::new(self.index.clone())
    }

    pub fn delete_operation(&self) -> DeleteAssetOperation {
        DeleteAssetOperation::new(self.blobs.clone(), self.index.clone(), self.keys.clone())
    }

    pub fn reconcile_operation(&self) -> ReconcileOperation {
        ReconcileOperation::new(self.blobs.clone(), self.index.clone(), self.keys.clone())
    }

    pub fn registry(&self) -> AssetRegistry {
        AssetRegistry::new(self.blobs.clone(), self.index.clone(), self.keys.clone())
    }
}
