//! Error types for GatiScan

use thiserror::Error;

/// Frame tree lookup failures. All of them are recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Timed out after {waited_ms} ms waiting for {parent} -> {child}")]
    Timeout {
        parent: String,
        child: String,
        waited_ms: u64,
    },

    #[error("No transform between {parent} and {child}")]
    FrameNotFound { parent: String, child: String },

    #[error("Transform {parent} -> {child} not available at t={stamp_us} us")]
    Extrapolation {
        parent: String,
        child: String,
        stamp_us: u64,
    },
}

/// GatiScan error type
#[derive(Error, Debug)]
pub enum GatiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output channel closed")]
    ChannelClosed,
}

impl From<basic_toml::Error> for GatiError {
    fn from(e: basic_toml::Error) -> Self {
        GatiError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatiError>;
