use thiserror::Error;

pub type Result<T> = std::result::Result<T, StowError>;

#[derive(Error, Debug)]
pub enum StowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Checksum mismatch - data corruption: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("Node {node_id} timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("Quorum not met: need {required}, acknowledged {acknowledged}")]
    QuorumNotMet {
        required: usize,
        acknowledged: usize,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Data unavailable (all replicas failed or corrupted): {0}")]
    DataUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StowError {
    /// Errors a node call can produce that leave the rest of the fan-out unaffected.
    pub fn is_node_failure(&self) -> bool {
        matches!(
            self,
            StowError::NodeUnreachable(_)
                | StowError::Timeout { .. }
                | StowError::ChecksumMismatch { .. }
                | StowError::ChunkNotFound(_)
                | StowError::Http(_)
        )
    }
}

impl From<reqwest::Error> for StowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StowError::NodeUnreachable(err.to_string())
        } else {
            StowError::Http(err.to_string())
        }
    }
}
