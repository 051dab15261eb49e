//! Storage backends for Mediary
//!
//! Blob bytes live in an object store; asset records live in the metadata index.

pub mod blob_store;
pub mod metadata_index;

pub use blob_store::{BlobStore, ObjectBlobStore, S3BlobStoreConfig};
pub use metadata_index::{MetadataIndex, SqliteMetadataIndex};
