use buildcache_proto::{
    GetCachedResultRequest, GetCachedResultResponse, SetCachedResultRequest,
    SetCachedResultResponse,
};
use tonic::{Request, Response, Status};

use super::status::{status_from_error, status_success};
use crate::storage::DynActionCacheStore;

/// Digest-keyed cache of action results.
///
/// Storage failures travel in-band as a [`buildcache_proto::CasStatus`]: a
/// never-cached action is a benign `MISSING_DIGEST`, anything else is
/// `UNKNOWN` and fails the build on the client side.
pub struct ActionCacheService {
    store: DynActionCacheStore,
}

impl ActionCacheService {
    pub fn new(store: DynActionCacheStore) -> Self {
        Self { store }
    }

    pub async fn get_cached_result(
        &self,
        request: Request<GetCachedResultRequest>,
    ) -> Result<Response<GetCachedResultResponse>, Status> {
        let req = request.into_inner();
        let action_digest = req
            .action_digest
            .ok_or_else(|| Status::invalid_argument("action digest must be set"))?;

        match self.store.get(&action_digest).await {
            Ok(result) => {
                tracing::debug!("GetCachedResult {}: hit", action_digest.hash);
                Ok(Response::new(GetCachedResultResponse {
                    status: Some(status_success()),
                    result: Some(result),
                }))
            }
            Err(e) => {
                if e.is_not_found() {
                    tracing::debug!("GetCachedResult {}: miss", action_digest.hash);
                } else {
                    tracing::warn!("GetCachedResult {}: {}", action_digest.hash, e);
                }
                Ok(Response::new(GetCachedResultResponse {
                    status: Some(status_from_error(&e)),
                    result: None,
                }))
            }
        }
    }

    pub async fn set_cached_result(
        &self,
        request: Request<SetCachedResultRequest>,
    ) -> Result<Response<SetCachedResultResponse>, Status> {
        let req = request.into_inner();
        let (Some(action_digest), Some(result)) = (req.action_digest, req.result) else {
            return Err(Status::invalid_argument(
                "action digest and result must be set",
            ));
        };

        match self.store.put(&action_digest, &result).await {
            Ok(()) => {
                tracing::debug!("SetCachedResult {}: stored", action_digest.hash);
                Ok(Response::new(SetCachedResultResponse {
                    status: Some(status_success()),
                }))
            }
            Err(e) => {
                tracing::warn!("SetCachedResult {}: {}", action_digest.hash, e);
                Ok(Response::new(SetCachedResultResponse {
                    status: Some(status_from_error(&e)),
                }))
            }
        }
    }
}
