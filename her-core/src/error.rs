//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum HerError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// An observation from the environment lacks a required key.
    #[error("Observation does not contain key: {0}")]
    MissingObsKey(String),

    /// A feature vector has an unexpected length.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A checkpoint file required for loading does not exist.
    #[error("Checkpoint file not found: {0:?}")]
    CheckpointNotFound(PathBuf),

    /// Inconsistent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
