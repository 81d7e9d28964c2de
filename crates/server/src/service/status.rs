use buildcache_proto::{CasErrorCode, CasStatus};
use tonic::Status;

use crate::storage::StoreError;

pub fn status_success() -> CasStatus {
    CasStatus {
        succeeded: true,
        ..Default::default()
    }
}

/// Translates a storage failure into the in-band protocol status.
///
/// A missing digest is the one benign category: the caller recovers by
/// re-uploading. Everything else becomes `UNKNOWN` with the original
/// message attached, which callers treat as build-fatal. Reporting an
/// ordinary cache miss as `UNKNOWN` would abort entire builds on a cold
/// cache, so the distinction matters.
pub fn status_from_error(err: &StoreError) -> CasStatus {
    let error = if err.is_not_found() {
        CasErrorCode::MissingDigest
    } else {
        CasErrorCode::Unknown
    };
    CasStatus {
        succeeded: false,
        error: error as i32,
        error_detail: err.to_string(),
        missing_digests: vec![],
    }
}

/// Conversion for call sites where a storage failure must abort the call
/// instead of travelling in-band.
impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(_) => Status::not_found(err.to_string()),
            StoreError::InvalidArgument(_) => Status::invalid_argument(err.to_string()),
            StoreError::Corrupt { .. } => Status::data_loss(err.to_string()),
            StoreError::Io { .. } => Status::internal(err.to_string()),
        }
    }
}
