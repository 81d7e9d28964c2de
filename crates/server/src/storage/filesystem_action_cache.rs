use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use buildcache_proto::{ActionResult, ContentDigest};
use prost::Message;
use tokio::fs;
use tokio::sync::RwLock;

use super::error::StoreError;
use super::traits::ActionCacheStore;
use crate::util::digest::storage_key;

/// Write-through action result store: one encoded [`ActionResult`] file per
/// storage key, mirrored in an in-memory map.
///
/// The whole directory is deserialized once at startup. A record that fails
/// to read or parse fails the startup; a cache that might serve bad results
/// is worse than no cache.
#[derive(Debug)]
pub struct FileSystemActionCacheStore {
    base_path: PathBuf,
    values: RwLock<HashMap<String, ActionResult>>,
}

impl FileSystemActionCacheStore {
    pub async fn open(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::io(
                format!("creating action cache directory {}", base_path.display()),
                e,
            )
        })?;

        let mut values = HashMap::new();
        let mut entries = fs::read_dir(&base_path).await.map_err(|e| {
            StoreError::io(format!("listing action cache {}", base_path.display()), e)
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StoreError::io(format!("listing action cache {}", base_path.display()), e)
        })? {
            let meta = entry.metadata().await.map_err(|e| {
                StoreError::io(format!("inspecting {:?}", entry.file_name()), e)
            })?;
            if !meta.is_file() {
                continue;
            }
            if let Ok(key) = entry.file_name().into_string() {
                let result = read_record(&entry.path(), &key).await?;
                values.insert(key, result);
            }
        }
        tracing::debug!(
            "action cache at {} opened with {} results",
            base_path.display(),
            values.len()
        );

        Ok(Self {
            base_path,
            values: RwLock::new(values),
        })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

async fn read_record(path: &Path, key: &str) -> Result<ActionResult, StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(format!(
                "cached result {} does not exist",
                key
            )));
        }
        Err(e) => {
            return Err(StoreError::io(format!("reading cached result {}", key), e));
        }
    };
    ActionResult::decode(content.as_slice()).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        source: e,
    })
}

#[async_trait]
impl ActionCacheStore for FileSystemActionCacheStore {
    async fn get(&self, action_digest: &ContentDigest) -> Result<ActionResult, StoreError> {
        let key = storage_key(action_digest);
        self.values.read().await.get(&key).cloned().ok_or_else(|| {
            StoreError::NotFound(format!(
                "no cached result for action {}",
                action_digest.hash
            ))
        })
    }

    async fn put(
        &self,
        action_digest: &ContentDigest,
        result: &ActionResult,
    ) -> Result<(), StoreError> {
        let key = storage_key(action_digest);
        let encoded = result.encode_to_vec();

        // File first, then the map: a failed write never leaves a
        // memory-only record behind.
        let path = self.record_path(&key);
        fs::write(&path, &encoded)
            .await
            .map_err(|e| StoreError::io(format!("writing cached result {}", key), e))?;

        self.values.write().await.insert(key, result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::digest::compute_digest;
    use buildcache_proto::OutputFile;
    use tempfile::TempDir;

    fn sample_result() -> ActionResult {
        ActionResult {
            output_files: vec![OutputFile {
                path: "bazel-out/k8-fastbuild/bin/foo.o".to_string(),
                digest: Some(compute_digest(b"object bytes")),
                is_executable: false,
            }],
            exit_code: 0,
            stdout_digest: Some(compute_digest(b"compile log")),
            stderr_digest: None,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemActionCacheStore::open(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let action_digest = compute_digest(b"compile foo.c");
        let result = sample_result();

        store.put(&action_digest, &result).await.unwrap();
        assert_eq!(store.get(&action_digest).await.unwrap(), result);
    }

    #[tokio::test]
    async fn test_get_miss_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSystemActionCacheStore::open(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        let err = store.get(&compute_digest(b"never cached")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reload_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        let action_digest = compute_digest(b"compile foo.c");
        let result = sample_result();

        {
            let store = FileSystemActionCacheStore::open(temp_dir.path().to_path_buf())
                .await
                .unwrap();
            store.put(&action_digest, &result).await.unwrap();
        }

        let store = FileSystemActionCacheStore::open(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(store.get(&action_digest).await.unwrap(), result);
    }

    #[tokio::test]
    async fn test_corrupt_record_fails_startup() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("v0_deadbeef"), b"not a proto").unwrap();

        let err = FileSystemActionCacheStore::open(temp_dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
