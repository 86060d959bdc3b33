use axum::http::StatusCode;

/// Errors produced while handling a chunk upload or probe.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("chunk number {number} out of range 1..={total}")]
    ChunkOutOfRange { number: u64, total: u64 },

    #[error("chunk payload is {actual} bytes but currentChunkSize declared {declared}")]
    ChunkLengthMismatch { declared: u64, actual: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl UploadError {
    /// HTTP status the transport adapter should answer with.
    ///
    /// Validation failures are the client's fault; only storage failures are
    /// server-side. No variant is fatal to the process.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
