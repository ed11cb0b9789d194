//! Error types for message segmentation

use thiserror::Error;

/// Errors that can occur while segmenting messages
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The line classifier failed for a batch
    #[error("Classifier failed: {0}")]
    Classifier(String),

    /// No distribution was produced for a stream position
    #[error("Missing label distribution for position {position}")]
    MissingDistribution { position: usize },

    /// A distribution had the wrong number of scores
    #[error("Label distribution at position {position} has {actual} scores, expected {expected}")]
    DistributionShape {
        position: usize,
        expected: usize,
        actual: usize,
    },

    /// Unknown label name
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to parse a raw mail message
    #[error("Failed to parse message: {0}")]
    Message(String),

    /// An output sink rejected a record
    #[error("Sink failed: {0}")]
    Sink(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentError>;
