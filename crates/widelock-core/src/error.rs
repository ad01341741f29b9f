//! Error types for widelock-core operations

use widelock_backends::BackendError;

/// Result type for widelock-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running trials
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration rejected before any trial ran
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two grids of different shape were compared
    #[error("Grid size mismatch: expected {expected} cells, got {actual}")]
    GridSizeMismatch { expected: usize, actual: usize },

    /// Record set does not match the launch geometry
    #[error("Record count mismatch: workload expects {expected} records, got {actual}")]
    RecordCountMismatch { expected: usize, actual: usize },

    /// Encoded record buffer has a partial trailing record
    #[error("Malformed record buffer: {len} bytes is not a multiple of {record_size}")]
    MalformedRecords { len: usize, record_size: usize },

    /// The dispatch thread panicked before the workload finished
    #[error("Workload dispatch thread panicked")]
    DispatchPanicked,

    /// Report rendering failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Allocation or dispatch failure in the backend
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
