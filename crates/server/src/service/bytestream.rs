use buildcache_proto::{ReadRequest, ReadResponse, WriteRequest, WriteResponse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::storage::{BlobWriter, DynBlobStore};
use crate::util::digest::parse_resource_path;

pub type ReadStream = ReceiverStream<Result<ReadResponse, Status>>;

/// Chunked blob transfer: one logical stream per blob, chunks strictly in
/// byte order on both directions.
pub struct ByteStreamService {
    blob_store: DynBlobStore,
    max_chunk_size: usize,
}

/// Progress of an inbound write stream.
enum WriteState {
    AwaitFirstChunk,
    Writing { writer: BlobWriter, committed: i64 },
    Done { committed: i64 },
}

impl ByteStreamService {
    pub fn new(blob_store: DynBlobStore, max_chunk_size: usize) -> Self {
        Self {
            blob_store,
            max_chunk_size,
        }
    }

    /// Consumes a client write stream and stores the blob it carries.
    ///
    /// The first chunk names the target resource and must start at offset
    /// zero; resuming an interrupted write is not supported. Every chunk is
    /// fed to a single store writer in arrival order, and the writer is
    /// closed or aborted on every exit path, so an abandoned stream leaves
    /// nothing readable behind.
    pub async fn write<S>(&self, request: Request<S>) -> Result<Response<WriteResponse>, Status>
    where
        S: Stream<Item = Result<WriteRequest, Status>> + Unpin,
    {
        let mut stream = request.into_inner();
        let mut state = WriteState::AwaitFirstChunk;

        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let WriteState::Writing { writer, .. } = state {
                        writer.abort().await.ok();
                    }
                    return Err(e);
                }
            };

            state = self.accept_chunk(state, chunk).await?;

            if let WriteState::Done { committed } = &state {
                return Ok(Response::new(WriteResponse {
                    committed_size: *committed,
                }));
            }
        }

        if let WriteState::Writing { writer, .. } = state {
            writer.abort().await.ok();
        }
        Err(Status::unimplemented(
            "write stream ended without finish_write; resumption is not supported",
        ))
    }

    async fn accept_chunk(
        &self,
        state: WriteState,
        chunk: WriteRequest,
    ) -> Result<WriteState, Status> {
        match state {
            WriteState::AwaitFirstChunk => {
                let digest = parse_resource_path(&chunk.resource_name)?;
                if chunk.write_offset != 0 {
                    return Err(Status::unimplemented(format!(
                        "first chunk at offset {}; write resumption is not supported",
                        chunk.write_offset
                    )));
                }
                tracing::debug!(
                    "Write stream for {} ({} bytes declared)",
                    digest.hash,
                    digest.size_bytes
                );

                let writer = self.blob_store.write(&digest).await.map_err(Status::from)?;
                self.feed(writer, 0, chunk).await
            }
            // Offsets after the first chunk are trusted from stream order.
            WriteState::Writing { writer, committed } => self.feed(writer, committed, chunk).await,
            WriteState::Done { .. } => {
                Err(Status::invalid_argument("chunk received after finish_write"))
            }
        }
    }

    async fn feed(
        &self,
        mut writer: BlobWriter,
        committed: i64,
        chunk: WriteRequest,
    ) -> Result<WriteState, Status> {
        if let Err(e) = writer.write(&chunk.data).await {
            writer.abort().await.ok();
            return Err(Status::internal(format!("failed to store chunk: {}", e)));
        }
        let committed = committed + chunk.data.len() as i64;

        if chunk.finish_write {
            writer.close().await.map_err(Status::from)?;
            Ok(WriteState::Done { committed })
        } else {
            Ok(WriteState::Writing { writer, committed })
        }
    }

    /// Streams a stored blob back in bounded chunks, in strictly increasing
    /// offset order.
    ///
    /// An offset beyond the stored size fails with `OutOfRange` before any
    /// chunk is emitted; an offset exactly at the size yields an empty
    /// stream. The stream simply closes at end of blob, with no terminal
    /// chunk.
    pub async fn read(&self, request: Request<ReadRequest>) -> Result<Response<ReadStream>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "Read request: {} at offset {}",
            req.resource_name,
            req.read_offset
        );

        let digest = parse_resource_path(&req.resource_name)?;
        if req.read_offset < 0 {
            return Err(Status::invalid_argument("read_offset must not be negative"));
        }
        if req.read_limit < 0 {
            return Err(Status::invalid_argument("read_limit must not be negative"));
        }

        let mut reader = self.blob_store.read(&digest).await.map_err(Status::from)?;
        let size = reader.digest().size_bytes;
        if req.read_offset > size {
            return Err(Status::out_of_range(format!(
                "read_offset {} beyond blob size {}",
                req.read_offset, size
            )));
        }

        let mut remaining = size - req.read_offset;
        if req.read_limit > 0 {
            remaining = remaining.min(req.read_limit);
        }
        let start_offset = req.read_offset;
        let chunk_size = self.max_chunk_size;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            if remaining == 0 {
                return;
            }
            if start_offset > 0 {
                if let Err(e) = reader.skip(start_offset as u64).await {
                    let _ = tx
                        .send(Err(Status::internal(format!(
                            "failed to reach offset {}: {}",
                            start_offset, e
                        ))))
                        .await;
                    return;
                }
            }

            let mut offset = start_offset;
            let mut buf = vec![0u8; chunk_size];
            while remaining > 0 {
                let want = remaining.min(chunk_size as i64) as usize;
                let n = match reader.read(&mut buf[..want]).await {
                    Ok(n) => n,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Status::internal(format!("read error: {}", e))))
                            .await;
                        return;
                    }
                };
                if n == 0 {
                    break;
                }

                let response = ReadResponse {
                    offset,
                    data: buf[..n].to_vec(),
                };
                if tx.send(Ok(response)).await.is_err() {
                    // Client went away; dropping the reader closes the blob.
                    break;
                }
                offset += n as i64;
                remaining -= n as i64;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
