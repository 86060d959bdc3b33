use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;

use crate::error::UploadError;
use crate::models::ChunkMeta;

/// upper bound on declared chunk counts, keeps the bitmap allocation sane
/// (a million chunks of 1 MiB already covers a 1 TiB transfer)
pub const MAX_TOTAL_CHUNKS: u64 = 1 << 20;

/// outcome of a single chunk write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// bytes written, transfer still has chunks outstanding
    Accepted,
    /// chunk already on disk, nothing changed
    Duplicate,
    /// this write was the last one and the file has been finalized
    Completed,
}

/// mutable half of a transfer, guarded by the per-transfer lock
struct Progress {
    /// open handle to the temporary file; taken on finalize
    file: Option<Arc<File>>,
    received: Vec<bool>,
    received_count: u64,
    finalized: bool,
}

/// state for one in-flight chunked transfer
///
/// `total_chunks` / `total_size` / `chunk_size` are fixed by the first chunk
/// seen for the identifier; later requests that declare different values are
/// ignored by the registry.
pub struct TransferState {
    identifier: String,
    tmp_path: PathBuf,
    final_path: PathBuf,
    total_chunks: u64,
    total_size: u64,
    chunk_size: u64,
    progress: Mutex<Progress>,
}

impl TransferState {
    /// create the temporary file preallocated to `total_size` bytes and a
    /// fresh all-unreceived state
    pub async fn create(uploads_dir: &Path, meta: &ChunkMeta) -> Result<Self, UploadError> {
        if meta.total_chunks == 0 {
            return Err(UploadError::InvalidField {
                field: "totalChunks",
                reason: "must be at least 1".to_string(),
            });
        }
        if meta.total_chunks > MAX_TOTAL_CHUNKS {
            return Err(UploadError::InvalidField {
                field: "totalChunks",
                reason: format!("exceeds maximum of {}", MAX_TOTAL_CHUNKS),
            });
        }
        if meta.chunk_size == 0 {
            return Err(UploadError::InvalidField {
                field: "chunkSize",
                reason: "must be at least 1".to_string(),
            });
        }

        let tmp_path = uploads_dir.join(format!("{}.tmp", meta.filename));
        let final_path = uploads_dir.join(&meta.filename);

        let total_size = meta.total_size;
        let path = tmp_path.clone();
        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = File::create(&path)?;
            // preallocate so every positioned write lands inside the file
            file.set_len(total_size)?;
            Ok(file)
        })
        .await
        .map_err(join_to_io)??;

        tracing::debug!("Created {:?} preallocated to {} bytes", tmp_path, total_size);

        Ok(Self {
            identifier: meta.identifier.clone(),
            tmp_path,
            final_path,
            total_chunks: meta.total_chunks,
            total_size: meta.total_size,
            chunk_size: meta.chunk_size,
            progress: Mutex::new(Progress {
                file: Some(Arc::new(file)),
                received: vec![false; meta.total_chunks as usize],
                received_count: 0,
                finalized: false,
            }),
        })
    }

    /// write one chunk at offset `(chunk_number - 1) * chunk_size`
    ///
    /// The write goes through a positioned-write primitive and shares no file
    /// cursor, so writes for distinct chunk numbers may run concurrently. The
    /// chunk is marked received only after its bytes hit the file; the write
    /// that brings the count to `total_chunks` finalizes exactly once.
    pub async fn write_chunk(
        &self,
        chunk_number: u64,
        data: Bytes,
        declared_len: u64,
    ) -> Result<ChunkOutcome, UploadError> {
        if chunk_number == 0 || chunk_number > self.total_chunks {
            return Err(UploadError::ChunkOutOfRange {
                number: chunk_number,
                total: self.total_chunks,
            });
        }
        if data.len() as u64 != declared_len {
            return Err(UploadError::ChunkLengthMismatch {
                declared: declared_len,
                actual: data.len() as u64,
            });
        }
        let index = (chunk_number - 1) as usize;

        // duplicate detection happens before any I/O: a retransmit is free,
        // and a retransmit after finalize never touches the closed handle
        let file = {
            let progress = self.progress.lock().unwrap();
            if progress.received[index] {
                return Ok(ChunkOutcome::Duplicate);
            }
            match &progress.file {
                Some(file) => Arc::clone(file),
                // finalized implies every bit is set, so this arm cannot be
                // reached with the bit above unset; degrade to a no-op
                None => return Ok(ChunkOutcome::Duplicate),
            }
        };

        let offset = (chunk_number - 1) * self.chunk_size;
        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(join_to_io)??;

        // a failed write returns above and leaves the bitmap untouched
        let handle = {
            let mut progress = self.progress.lock().unwrap();
            if !progress.received[index] {
                progress.received[index] = true;
                progress.received_count += 1;
            }
            if progress.received_count == self.total_chunks && !progress.finalized {
                progress.finalized = true;
                progress.file.take()
            } else {
                None
            }
        };

        match handle {
            Some(handle) => {
                self.finalize(handle).await?;
                Ok(ChunkOutcome::Completed)
            }
            None => Ok(ChunkOutcome::Accepted),
        }
    }

    /// sync, close, and rename temporary → final
    ///
    /// Reached only by the single caller that flipped `finalized` under the
    /// lock, so the rename happens at most once per transfer.
    async fn finalize(&self, handle: Arc<File>) -> Result<(), UploadError> {
        let tmp = self.tmp_path.clone();
        let dest = self.final_path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            handle.sync_all()?;
            // last clone of the handle in the common case; racing writers of
            // an already-received chunk keep the fd alive a little longer,
            // which is harmless since the rename is path-based
            drop(handle);
            std::fs::rename(&tmp, &dest)
        })
        .await
        .map_err(join_to_io)??;

        tracing::info!(
            "✅ Transfer {} complete: {:?} ({} bytes)",
            self.identifier,
            self.final_path,
            self.total_size
        );
        Ok(())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn temp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// whether `chunk_number`'s bytes are on disk (false for out-of-range)
    pub fn is_received(&self, chunk_number: u64) -> bool {
        if chunk_number == 0 || chunk_number > self.total_chunks {
            return false;
        }
        self.progress.lock().unwrap().received[(chunk_number - 1) as usize]
    }

    pub fn received_count(&self) -> u64 {
        self.progress.lock().unwrap().received_count
    }

    pub fn is_finalized(&self) -> bool {
        self.progress.lock().unwrap().finalized
    }
}

fn join_to_io(err: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

// positioned write, independent of the handle's cursor

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole chunk",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
