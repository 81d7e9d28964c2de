pub mod error;
pub mod filesystem;
pub mod filesystem_action_cache;
pub mod memory_action_cache;
pub mod traits;

pub use error::StoreError;
pub use filesystem::{BlobReader, BlobWriter, FileSystemBlobStore};
pub use filesystem_action_cache::FileSystemActionCacheStore;
pub use memory_action_cache::MemoryActionCacheStore;
pub use traits::{ActionCacheStore, BlobStore, DynActionCacheStore, DynBlobStore};

use std::sync::Arc;

use anyhow::Result;

use crate::config::{ActionCacheConfig, CasStorageConfig};

pub async fn create_blob_store(config: &CasStorageConfig) -> Result<DynBlobStore> {
    match config {
        CasStorageConfig::FileSystem { root_dir } => {
            let store = FileSystemBlobStore::open(root_dir.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}

pub async fn create_action_cache_store(config: &ActionCacheConfig) -> Result<DynActionCacheStore> {
    match config {
        ActionCacheConfig::FileSystem { root_dir } => {
            let store = FileSystemActionCacheStore::open(root_dir.clone()).await?;
            Ok(Arc::new(store))
        }
        ActionCacheConfig::Memory => Ok(Arc::new(MemoryActionCacheStore::new())),
    }
}
