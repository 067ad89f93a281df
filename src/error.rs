/// Error type shared by every extension context
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtensionError {
    /// Snapshot version or top-level shape does not match what we understand
    #[error("stock data has wrong shape (version {found:?}, expected {expected})")]
    SchemaMismatch { found: Option<i64>, expected: i64 },

    #[error("malformed stock data: {0}")]
    MalformedSnapshot(String),

    /// No listener on the other end, or the message could not be delivered
    #[error("message delivery failed: {0}")]
    Transport(String),

    /// The coordinator answered a sync request with an empty response
    #[error("sync was rejected by the background worker")]
    SyncRejected,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("catalog unavailable: {0}")]
    Catalog(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("timed out after {ms} ms")]
    Timeout { ms: u32 },

    #[error("invalid tracker port: {0}")]
    InvalidPort(String),
}

impl From<serde_json::Error> for ExtensionError {
    fn from(err: serde_json::Error) -> Self {
        ExtensionError::Serialization(err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for ExtensionError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        ExtensionError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtensionError>;
