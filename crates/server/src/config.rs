use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 2 MiB keeps every streamed chunk comfortably below the typical 4 MiB
/// per-message limit of the transport.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub cas: CasStorageConfig,
    pub action_cache: ActionCacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend")]
pub enum CasStorageConfig {
    #[serde(rename = "filesystem")]
    FileSystem { root_dir: PathBuf },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend")]
pub enum ActionCacheConfig {
    #[serde(rename = "filesystem")]
    FileSystem { root_dir: PathBuf },

    #[serde(rename = "memory")]
    Memory,
}

impl CacheConfig {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CacheConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: CacheConfig = toml::from_str(
            r#"
            [storage.cas]
            backend = "filesystem"
            root_dir = "/var/cache/buildcache/blobs"

            [storage.action_cache]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.transfer.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert!(matches!(
            config.storage.cas,
            CasStorageConfig::FileSystem { .. }
        ));
        assert!(matches!(
            config.storage.action_cache,
            ActionCacheConfig::Memory
        ));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = CacheConfig {
            transfer: TransferConfig {
                max_chunk_size: 1024,
            },
            storage: StorageConfig {
                cas: CasStorageConfig::FileSystem {
                    root_dir: PathBuf::from("/tmp/blobs"),
                },
                action_cache: ActionCacheConfig::FileSystem {
                    root_dir: PathBuf::from("/tmp/actions"),
                },
            },
        };

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.toml");
        config.to_file(&path).unwrap();

        let reloaded = CacheConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.transfer.max_chunk_size, 1024);
        assert!(matches!(
            reloaded.storage.action_cache,
            ActionCacheConfig::FileSystem { root_dir } if root_dir == PathBuf::from("/tmp/actions")
        ));
    }
}
