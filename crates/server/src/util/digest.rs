use buildcache_proto::ContentDigest;
use sha2::{Digest as _, Sha256};

use crate::storage::StoreError;

/// Version prefix of the storage key format. Bumped if the hash algorithm
/// or key layout ever changes, so new keys cannot collide with keys written
/// by an older codec.
pub const KEY_FORMAT_VERSION: u32 = 0;

/// Canonical storage key for a digest: `"v<version>_<hash>"`.
///
/// Derived from the hash alone. Two digests with the same hash but
/// different (possibly stale) sizes map to the same storage slot.
pub fn storage_key(digest: &ContentDigest) -> String {
    format!("v{}_{}", KEY_FORMAT_VERSION, digest.hash)
}

/// Extracts the digest from a transfer resource path.
///
/// The grammar is `[instance_name/][uploads/<uuid>/]blobs/<hash>/<size>`
/// with arbitrary trailing segments; the first `blobs` segment anchors the
/// digest fields.
pub fn parse_resource_path(path: &str) -> Result<ContentDigest, StoreError> {
    let parts: Vec<&str> = path.split('/').collect();

    let blobs_idx = parts.iter().position(|&p| p == "blobs").ok_or_else(|| {
        StoreError::InvalidArgument(format!("resource path {:?} has no 'blobs' segment", path))
    })?;

    if blobs_idx + 2 >= parts.len() {
        return Err(StoreError::InvalidArgument(format!(
            "resource path {:?} is missing hash and size after 'blobs'",
            path
        )));
    }

    let hash = parts[blobs_idx + 1];
    if hash.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "resource path {:?} has an empty hash",
            path
        )));
    }

    let size_bytes = parts[blobs_idx + 2].parse::<i64>().map_err(|e| {
        StoreError::InvalidArgument(format!(
            "resource path {:?} has an unparsable size: {}",
            path, e
        ))
    })?;
    if size_bytes < 0 {
        return Err(StoreError::InvalidArgument(format!(
            "resource path {:?} has a negative size",
            path
        )));
    }

    Ok(ContentDigest {
        hash: hash.to_string(),
        size_bytes,
    })
}

/// SHA-256 digest of a byte slice, hex-encoded.
pub fn compute_digest(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let hash = hex::encode(hasher.finalize());

    ContentDigest {
        hash,
        size_bytes: data.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_digest() {
        let data = b"hello world";
        let digest = compute_digest(data);

        assert_eq!(digest.size_bytes, 11);
        assert_eq!(
            digest.hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_storage_key_ignores_size() {
        let a = ContentDigest {
            hash: "A0F4".to_string(),
            size_bytes: 123,
        };
        let b = ContentDigest {
            hash: "A0F4".to_string(),
            size_bytes: 999,
        };

        assert_eq!(storage_key(&a), "v0_A0F4");
        assert_eq!(storage_key(&a), storage_key(&b));
    }

    #[test]
    fn test_parse_resource_path() {
        let valid: &[&str] = &[
            "with_instance/blobs/A0F4BBBB11114444/123456789",
            "with_instance/uploads/blobs/A0F4BBBB11114444/123456789",
            "with_instance/uploads/blobs/A0F4BBBB11114444/123456789/mydir/myfile.zip",
            "uploads/blobs/A0F4BBBB11114444/123456789/mydir/myfile.zip",
            "blobs/A0F4BBBB11114444/123456789",
        ];
        for input in valid {
            let digest = parse_resource_path(input).unwrap();
            assert_eq!(digest.hash, "A0F4BBBB11114444", "hash for {}", input);
            assert_eq!(digest.size_bytes, 123456789, "size for {}", input);
        }

        let invalid: &[&str] = &[
            "blob/A0F4BBBB11114444/123456789",
            "blobs/A0F4BBBB11114444/asda",
            "blobs/A0F4BBBB11114444",
            "blobs//123",
            "blobs/A0F4BBBB11114444/-5",
            "",
        ];
        for input in invalid {
            let err = parse_resource_path(input).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidArgument(_)),
                "{} should be rejected as invalid",
                input
            );
        }
    }
}
