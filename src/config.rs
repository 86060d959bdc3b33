use std::path::PathBuf;
use sha2::{Sha256, Digest};

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// directory uploads are assembled into
    pub uploads_dir: PathBuf,
    /// listen address
    pub host: String,
    /// listen port
    pub port: u16,
    /// maximum request body size in bytes (caps a single chunk)
    pub max_chunk_body_size: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// api key for upload authentication (hashed)
    pub api_key_hash: String,
    /// cors allowed origins (comma-separated, `*` for any)
    pub cors_origins: Vec<String>,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // get api key from env and hash it
        let api_key = std::env::var("API_KEY")
            .unwrap_or_else(|_| {
                tracing::warn!("⚠️  No API_KEY set! Using default 'changeme' - CHANGE THIS IN PRODUCTION!");
                "changeme".to_string()
            });

        let api_key_hash = Self::hash_api_key(&api_key);

        // parse cors origins; the stock uploader widget runs in the browser,
        // so the default mirrors the permissive setup it expects
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            uploads_dir: std::env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
            host: std::env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            max_chunk_body_size: std::env::var("MAX_CHUNK_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64 * 1024 * 1024), // 64MB default, chunks are small
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(8),
            api_key_hash,
            cors_origins,
        }
    }

    // hash api key using sha256
    pub fn hash_api_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }
}
