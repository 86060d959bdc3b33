use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::UploadError;
use crate::models::ChunkMeta;
use crate::transfer::TransferState;

/// result of asking whether a chunk has arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkProbe {
    /// no transfer known for the identifier
    Absent,
    /// transfer exists but this chunk has not been written yet
    Pending,
    /// chunk bytes are on disk
    Present,
}

/// identifier → transfer table
///
/// Entries are created lazily when the first chunk for an identifier arrives
/// and live for the whole transfer; there is no eviction. Lookups are
/// lock-free on the map; only the create-if-absent path takes `create_lock`.
pub struct UploadRegistry {
    uploads_dir: PathBuf,
    transfers: DashMap<String, Arc<TransferState>>,
    /// serializes the check-create-insert sequence so the temporary file is
    /// created and preallocated exactly once per identifier
    create_lock: Mutex<()>,
}

impl UploadRegistry {
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self {
            uploads_dir,
            transfers: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// resolve the transfer for `meta.identifier`, creating it on first sight
    ///
    /// An existing entry is returned unchanged: totals and sizes declared by
    /// later requests are ignored in favor of the values fixed at creation.
    pub async fn get_or_create(&self, meta: &ChunkMeta) -> Result<Arc<TransferState>, UploadError> {
        if let Some(existing) = self.transfers.get(&meta.identifier) {
            return Ok(Arc::clone(existing.value()));
        }

        let _guard = self.create_lock.lock().await;

        // a racing caller may have created the entry while we waited
        if let Some(existing) = self.transfers.get(&meta.identifier) {
            return Ok(Arc::clone(existing.value()));
        }

        tracing::debug!(
            "New transfer {}: {} chunks, {} bytes total",
            meta.identifier,
            meta.total_chunks,
            meta.total_size
        );
        let state = Arc::new(TransferState::create(&self.uploads_dir, meta).await?);
        self.transfers
            .insert(meta.identifier.clone(), Arc::clone(&state));
        Ok(state)
    }

    /// read-only arrival check; never blocks on in-flight writes beyond the
    /// moment it takes to read the bitmap entry
    pub fn probe(&self, identifier: &str, chunk_number: u64) -> ChunkProbe {
        match self.transfers.get(identifier) {
            None => ChunkProbe::Absent,
            Some(transfer) => {
                if transfer.is_received(chunk_number) {
                    ChunkProbe::Present
                } else {
                    ChunkProbe::Pending
                }
            }
        }
    }

    /// number of transfers currently tracked
    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}
