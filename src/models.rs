use serde::{Deserialize, Serialize};

// wire field names follow the resumable-upload form protocol (camelCase)

/// metadata declared by the first chunk of a transfer
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub identifier: String,
    /// already sanitized by the transport adapter
    pub filename: String,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub total_size: u64,
}

// query parameters for the chunk probe endpoint
#[derive(Deserialize, Debug)]
pub struct ProbeParams {
    pub identifier: String,
    #[serde(rename = "chunkNumber")]
    pub chunk_number: u64,
}

// response for an accepted chunk write
#[derive(Serialize, Debug)]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub chunk_number: u64,
    pub received_chunks: u64,
    pub total_chunks: u64,
    /// true on the write that completed the transfer
    pub complete: bool,
    /// true when the chunk had already been received and the write was skipped
    pub skipped: bool,
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
