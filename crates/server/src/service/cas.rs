use buildcache_proto::{
    CasErrorCode, CasStatus, FindMissingBlobsRequest, FindMissingBlobsResponse,
};
use tonic::{Request, Response, Status};

use super::status::status_success;
use crate::storage::DynBlobStore;

/// Batch lookup over the blob store.
pub struct CasService {
    blob_store: DynBlobStore,
}

impl CasService {
    pub fn new(blob_store: DynBlobStore) -> Self {
        Self { blob_store }
    }

    /// Returns the subset of the requested digests that is not present.
    ///
    /// A storage failure while checking one digest is folded into the
    /// status as missing, with the detail preserved, instead of failing the
    /// other digests in the same request.
    pub async fn find_missing_blobs(
        &self,
        request: Request<FindMissingBlobsRequest>,
    ) -> Result<Response<FindMissingBlobsResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("FindMissingBlobs request: {} digests", req.digests.len());

        let mut missing = Vec::new();
        let mut details = Vec::new();
        for digest in &req.digests {
            if digest.hash.is_empty() {
                return Err(Status::invalid_argument("digest with an empty hash"));
            }
            match self.blob_store.exists(digest).await {
                Ok(true) => {}
                Ok(false) => missing.push(digest.clone()),
                Err(e) => {
                    tracing::warn!("existence check failed for {}: {}", digest.hash, e);
                    missing.push(digest.clone());
                    details.push(e.to_string());
                }
            }
        }

        let status = if missing.is_empty() {
            status_success()
        } else {
            CasStatus {
                succeeded: false,
                error: CasErrorCode::MissingDigest as i32,
                error_detail: details.join("; "),
                missing_digests: missing,
            }
        };
        tracing::debug!(
            "{} digests missing",
            status.missing_digests.len()
        );

        Ok(Response::new(FindMissingBlobsResponse {
            status: Some(status),
        }))
    }
}
