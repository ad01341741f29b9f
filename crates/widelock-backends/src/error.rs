//! Error types for backend operations

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while allocating arenas or dispatching kernels
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Launch geometry the backend cannot run
    #[error("invalid launch configuration: {0}")]
    InvalidLaunchConfig(String),

    /// Region access past the end of an arena
    #[error("arena access out of bounds: offset {offset} + len {len} > arena len {arena_len}")]
    ArenaOutOfBounds {
        offset: usize,
        len: usize,
        arena_len: usize,
    },

    /// Requested arena exceeds the backend limit
    #[error("arena allocation of {requested} words exceeds limit of {limit} words")]
    AllocationTooLarge { requested: usize, limit: usize },

    /// Worker pool could not be built
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// A kernel reported a failure from inside a group
    #[error("kernel '{kernel}' failed in group {group}: {message}")]
    KernelFailure {
        kernel: String,
        group: u64,
        message: String,
    },
}

impl BackendError {
    /// Create an invalid launch configuration error
    pub fn invalid_launch(msg: impl Into<String>) -> Self {
        Self::InvalidLaunchConfig(msg.into())
    }

    /// Create a kernel failure error
    pub fn kernel_failure(kernel: impl Into<String>, group: u64, msg: impl Into<String>) -> Self {
        Self::KernelFailure {
            kernel: kernel.into(),
            group,
            message: msg.into(),
        }
    }
}
