use crate::{AssetKind, BlobStore, KeyDeriver, MetadataIndex, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Offline diff between blob keys and index records.
///
/// Never runs in a request path. Only orphaned blobs are ever removed; dangling
/// records are reported for manual repair.
#[derive(Clone)]
pub struct ReconcileOperation {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    keys: KeyDeriver,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOperationRequest {
    pub delete_orphaned_blobs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DanglingRecord {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub blobs_scanned: usize,
    pub records_scanned: usize,
    pub orphaned_blobs: Vec<String>,
    pub dangling_records: Vec<DanglingRecord>,
    pub deleted_blobs: Vec<String>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_blobs.is_empty() && self.dangling_records.is_empty()
    }
}

impl ReconcileOperation {
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

    pub async fn run(&self, request: ReconcileOperationRequest) -> Result<ReconcileReport> {
        let mut blob_keys = BTreeSet::new();
        for kind in AssetKind::ALL {
            blob_keys.extend(self.blob_store.list(kind.as_str()).await?);
        }

        let records = self.index.all_urls()?;
        let mut referenced = BTreeSet::new();
        let mut dangling_records = Vec::new();

        for (id, url) in &records {
            match self.keys.key_for_url(url) {
                Some(key) if blob_keys.contains(&key) => {
                    referenced.insert(key);
                }
                _ => dangling_records.push(DanglingRecord {
                    id: id.clone(),
                    url: url.clone(),
                }),
            }
        }

        let orphaned_blobs: Vec<String> = blob_keys.difference(&referenced).cloned().collect();

        let mut deleted_blobs = Vec::new();
        if request.delete_orphaned_blobs {
            // A Create may have indexed one of these keys since the first scan.
            let live = self.referenced_keys()?;
            for key in &orphaned_blobs {
                if live.contains(key) {
                    tracing::info!("skipping blob {}, it is now referenced", key);
                    continue;
                }
                match self.blob_store.delete(key).await {
                    Ok(()) => deleted_blobs.push(key.clone()),
                    Err(error) => {
                        tracing::warn!("failed to delete orphaned blob {}: {}", key, error);
                    }
                }
            }
        }

        let report = ReconcileReport {
            blobs_scanned: blob_keys.len(),
            records_scanned: records.len(),
            orphaned_blobs,
            dangling_records,
            deleted_blobs,
        };

        tracing::info!(
            "reconcile scanned blobs={} records={} orphaned={} dangling={} deleted={}",
            report.blobs_scanned,
            report.records_scanned,
            report.orphaned_blobs.len(),
            report.dangling_records.len(),
            report.deleted_blobs.len()
        );

        Ok(report)
    }

    fn referenced_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .index
            .all_urls()?
            .into_iter()
            .filter_map(|(_, url)| self.keys.key_for_url(&url))
            .collect())
    }
}
