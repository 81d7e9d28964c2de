//! Message types exchanged between a build client and the local cache
//! daemon: content digests, the in-band cache status, blob lookup, chunked
//! blob transfer, and cached action results.
//!
//! The message set is small and stable, so the structs are maintained by
//! hand as `prost` messages instead of being generated at build time. Field
//! tags are part of the wire contract and must never be reused.

/// Identifies a blob (or an action) by the hash of its canonical bytes.
///
/// Two digests name the same object iff their `hash` fields are equal;
/// `size_bytes` is carried for bookkeeping and is not authoritative for
/// identity.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ContentDigest {
    #[prost(string, tag = "1")]
    pub hash: String,
    #[prost(int64, tag = "2")]
    pub size_bytes: i64,
}

/// Error category of a [`CasStatus`].
///
/// `MissingDigest` is the one category a client may recover from by
/// re-uploading; anything reported as `Unknown` fails the build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CasErrorCode {
    Unknown = 0,
    MissingDigest = 1,
}

/// In-band operation status carried by cache replies.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CasStatus {
    #[prost(bool, tag = "1")]
    pub succeeded: bool,
    #[prost(enumeration = "CasErrorCode", tag = "2")]
    pub error: i32,
    #[prost(string, tag = "3")]
    pub error_detail: String,
    #[prost(message, repeated, tag = "4")]
    pub missing_digests: Vec<ContentDigest>,
}

impl CasStatus {
    /// Decoded error category; unrecognized values collapse to `Unknown`.
    pub fn error_code(&self) -> CasErrorCode {
        CasErrorCode::try_from(self.error).unwrap_or(CasErrorCode::Unknown)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FindMissingBlobsRequest {
    #[prost(string, tag = "1")]
    pub instance_name: String,
    #[prost(message, repeated, tag = "2")]
    pub digests: Vec<ContentDigest>,
}

/// Reply to a batch lookup. The subset of digests that is not present
/// travels inside `status.missing_digests`; an empty subset is reported as
/// `succeeded: true`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FindMissingBlobsResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<CasStatus>,
}

/// One chunk of a client-to-server blob upload.
///
/// Only the first chunk of a stream carries `resource_name`; the final
/// chunk sets `finish_write`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(string, tag = "1")]
    pub resource_name: String,
    #[prost(int64, tag = "2")]
    pub write_offset: i64,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
    #[prost(bool, tag = "4")]
    pub finish_write: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteResponse {
    #[prost(int64, tag = "1")]
    pub committed_size: i64,
}

/// Requests a server-to-client blob download. `read_limit` of zero means
/// "to the end of the blob".
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub resource_name: String,
    #[prost(int64, tag = "2")]
    pub read_offset: i64,
    #[prost(int64, tag = "3")]
    pub read_limit: i64,
}

/// One chunk of a blob download, at `offset` within the blob.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadResponse {
    #[prost(int64, tag = "1")]
    pub offset: i64,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// A file produced by a build action, stored in the blob store and
/// referenced here by digest.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OutputFile {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<ContentDigest>,
    #[prost(bool, tag = "3")]
    pub is_executable: bool,
}

/// Cached outcome of a build action. Small by itself; the heavy outputs
/// live in the blob store and are referenced by digest.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ActionResult {
    #[prost(message, repeated, tag = "1")]
    pub output_files: Vec<OutputFile>,
    #[prost(int32, tag = "2")]
    pub exit_code: i32,
    #[prost(message, optional, tag = "3")]
    pub stdout_digest: Option<ContentDigest>,
    #[prost(message, optional, tag = "4")]
    pub stderr_digest: Option<ContentDigest>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetCachedResultRequest {
    #[prost(string, tag = "1")]
    pub instance_name: String,
    #[prost(message, optional, tag = "2")]
    pub action_digest: Option<ContentDigest>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetCachedResultResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<CasStatus>,
    #[prost(message, optional, tag = "2")]
    pub result: Option<ActionResult>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SetCachedResultRequest {
    #[prost(string, tag = "1")]
    pub instance_name: String,
    #[prost(message, optional, tag = "2")]
    pub action_digest: Option<ContentDigest>,
    #[prost(message, optional, tag = "3")]
    pub result: Option<ActionResult>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SetCachedResultResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<CasStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_accessor() {
        let status = CasStatus::default();
        assert_eq!(status.error_code(), CasErrorCode::Unknown);

        let status = CasStatus {
            error: CasErrorCode::MissingDigest as i32,
            ..Default::default()
        };
        assert_eq!(status.error_code(), CasErrorCode::MissingDigest);

        let status = CasStatus {
            error: 42,
            ..Default::default()
        };
        assert_eq!(status.error_code(), CasErrorCode::Unknown);
    }
}
