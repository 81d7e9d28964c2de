use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use buildcache_proto::ContentDigest;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;

use super::error::StoreError;
use super::traits::BlobStore;
use crate::util::digest::storage_key;

type SizeIndex = Arc<RwLock<HashMap<String, i64>>>;

const SKIP_BUF_SIZE: usize = 64 * 1024;

/// Blob store backed by one file per storage key directly under a base
/// directory.
///
/// An in-memory size index, seeded by a single directory listing at
/// startup, answers every existence check and read-open; the filesystem is
/// never scanned after startup. The index lock is held only for the map
/// access itself, never across blob I/O, so a slow read of one blob cannot
/// block an existence check for another.
pub struct FileSystemBlobStore {
    base_path: PathBuf,
    size_index: SizeIndex,
}

impl FileSystemBlobStore {
    /// Creates the base directory if needed and seeds the size index from
    /// its contents.
    pub async fn open(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::io(
                format!("creating blob store directory {}", base_path.display()),
                e,
            )
        })?;

        let mut index = HashMap::new();
        let mut entries = fs::read_dir(&base_path).await.map_err(|e| {
            StoreError::io(format!("listing blob store {}", base_path.display()), e)
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StoreError::io(format!("listing blob store {}", base_path.display()), e)
        })? {
            let meta = entry.metadata().await.map_err(|e| {
                StoreError::io(format!("inspecting {:?}", entry.file_name()), e)
            })?;
            if !meta.is_file() {
                continue;
            }
            if let Ok(key) = entry.file_name().into_string() {
                index.insert(key, meta.len() as i64);
            }
        }
        tracing::debug!(
            "blob store at {} opened with {} blobs",
            base_path.display(),
            index.len()
        );

        Ok(Self {
            base_path,
            size_index: Arc::new(RwLock::new(index)),
        })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    async fn indexed_size(&self, key: &str) -> Option<i64> {
        self.size_index.read().await.get(key).copied()
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn exists(&self, digest: &ContentDigest) -> Result<bool, StoreError> {
        let key = storage_key(digest);
        Ok(self.indexed_size(&key).await.is_some())
    }

    async fn read(&self, digest: &ContentDigest) -> Result<BlobReader, StoreError> {
        let key = storage_key(digest);
        let Some(size) = self.indexed_size(&key).await else {
            return Err(StoreError::NotFound(format!(
                "blob for digest {} does not exist",
                digest.hash
            )));
        };

        let path = self.blob_path(&key);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!(
                    "blob for digest {} does not exist on disk",
                    digest.hash
                )));
            }
            Err(e) => {
                return Err(StoreError::io(
                    format!("opening blob file {}", path.display()),
                    e,
                ));
            }
        };

        // Expose the stored size, not whatever size the caller supplied.
        let digest = ContentDigest {
            hash: digest.hash.clone(),
            size_bytes: size,
        };
        Ok(BlobReader { digest, file })
    }

    async fn write(&self, digest: &ContentDigest) -> Result<BlobWriter, StoreError> {
        let key = storage_key(digest);
        let path = self.blob_path(&key);
        let file = fs::File::create(&path).await.map_err(|e| {
            StoreError::io(format!("creating blob file {}", path.display()), e)
        })?;

        // Indexed as soon as the writer opens: lookups may observe the blob
        // before its content is fully flushed. Callers accept this race in
        // exchange for a simple index.
        self.size_index
            .write()
            .await
            .insert(key.clone(), digest.size_bytes);

        Ok(BlobWriter {
            digest: digest.clone(),
            key,
            path,
            file,
            size_index: Arc::clone(&self.size_index),
        })
    }
}

/// Open read handle on a stored blob.
#[derive(Debug)]
pub struct BlobReader {
    digest: ContentDigest,
    file: fs::File,
}

impl BlobReader {
    /// Digest of the blob being served, with `size_bytes` set to the
    /// authoritative stored size.
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Fills `buf` completely unless the blob has fewer bytes remaining.
    /// Returns the number of bytes read; 0 means end of blob.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|e| StoreError::io("reading blob file", e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Discards `count` bytes from the front of the stream. There is no
    /// seek here; the skip is a forward read into a scratch buffer.
    pub async fn skip(&mut self, count: u64) -> Result<(), StoreError> {
        let mut scratch = vec![0u8; SKIP_BUF_SIZE];
        let mut remaining = count;
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let n = self.read(&mut scratch[..want]).await?;
            if n == 0 {
                return Err(StoreError::io(
                    "skipping blob bytes",
                    std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "blob ended before the requested offset",
                    ),
                ));
            }
            remaining -= n as u64;
        }
        Ok(())
    }
}

/// Open write handle for a blob. Exactly one of [`BlobWriter::close`] or
/// [`BlobWriter::abort`] must be called once writing ends.
pub struct BlobWriter {
    digest: ContentDigest,
    key: String,
    path: PathBuf,
    file: fs::File,
    size_index: SizeIndex,
}

impl BlobWriter {
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Writes the whole buffer or fails; a partial write is reported as an
    /// error, never silently truncated.
    pub async fn write(&mut self, buf: &[u8]) -> Result<(), StoreError> {
        self.file
            .write_all(buf)
            .await
            .map_err(|e| StoreError::io("writing blob file", e))
    }

    pub async fn close(mut self) -> Result<(), StoreError> {
        self.file
            .flush()
            .await
            .map_err(|e| StoreError::io("flushing blob file", e))
    }

    /// Drops an unfinished write: removes the backing file and the index
    /// entry so the digest is not observable as stored.
    pub async fn abort(self) -> Result<(), StoreError> {
        let BlobWriter {
            key,
            path,
            file,
            size_index,
            ..
        } = self;
        drop(file);

        size_index.write().await.remove(&key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(
                format!("removing aborted blob file {}", path.display()),
                e,
            )),
        }
    }
}
