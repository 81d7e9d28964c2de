use std::sync::Arc;

use async_trait::async_trait;
use buildcache_proto::{ActionResult, ContentDigest};

use super::error::StoreError;
use super::filesystem::{BlobReader, BlobWriter};

/// Content-addressable storage of arbitrary-size byte blobs, keyed by
/// digest.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether a blob exists for the digest. Answered from the existence
    /// index; errors here should fail builds.
    async fn exists(&self, digest: &ContentDigest) -> Result<bool, StoreError>;

    /// Opens a reader on the stored blob. Returns `NotFound` if no blob
    /// exists for the digest; other errors will cause failure of builds.
    ///
    /// The reader's digest carries the authoritative stored size, not the
    /// size the caller supplied.
    async fn read(&self, digest: &ContentDigest) -> Result<BlobReader, StoreError>;

    /// Opens a writer for the digest. A second write for the same digest
    /// replaces the blob wholesale; concurrent writers for one digest are
    /// last-writer-wins.
    async fn write(&self, digest: &ContentDigest) -> Result<BlobWriter, StoreError>;
}

pub type DynBlobStore = Arc<dyn BlobStore>;

/// Cache of [`ActionResult`]s keyed by the digest of the action that
/// produced them. The records are small and act as pointers into the blob
/// store (outputs, stdout, stderr).
#[async_trait]
pub trait ActionCacheStore: Send + Sync {
    /// Returns the cached result for an action digest. Must return
    /// `NotFound` if the action was never cached; other errors will cause
    /// failure of builds.
    async fn get(&self, action_digest: &ContentDigest) -> Result<ActionResult, StoreError>;

    /// Stores (or overwrites) the result for an action digest.
    async fn put(
        &self,
        action_digest: &ContentDigest,
        result: &ActionResult,
    ) -> Result<(), StoreError>;
}

pub type DynActionCacheStore = Arc<dyn ActionCacheStore>;
