use thiserror::Error;

/// Top-level error type for Parley.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Error from the generative-text provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a chat transport.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Message store error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
