//! Mediary Core - media asset registry over an object store and a metadata index
//!
//! - Deterministic storage keys: `{type}/{category}/{name}.{ext}`
//! - Blob bytes in any `object_store` backend (S3/R2, local disk, memory)
//! - Asset records in SQLite, with filtered, paginated and aggregated queries
//! - Blob-before-index ordering for both writes and deletes

pub mod asset;
pub mod error;
pub mod keys;
pub mod operations;
pub mod query;
pub mod registry;
pub mod storage;

pub use asset::{Asset, AssetKind, NewAsset, creation_timestamp};
pub use error::{MediaError, Result};
pub use keys::{DerivedKey, KeyDeriver};
pub use operations::*;
pub use query::{
    AssetFilter, AssetPage, AssetSort, CategoryCount, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    PageRequest, SortField, SortOrder,
};
pub use registry::AssetRegistry;
pub use storage::{
    BlobStore, MetadataIndex, ObjectBlobStore, S3BlobStoreConfig, SqliteMetadataIndex,
};
