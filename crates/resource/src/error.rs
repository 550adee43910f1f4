use std::io;

/// Errors surfaced by [`Resource`](crate::Resource) implementations
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The caller passed a URI or path this layer refuses to handle
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The resource does not exist
    #[error("resource not found: {0}")]
    NotFound(String),
    /// A directory operation was requested on a non-directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// A content operation was requested on a directory
    #[error("is a directory: {0}")]
    IsADirectory(String),
    /// The mount backing this resource was evicted or released
    #[error("mount backing {0} is no longer valid")]
    StaleMount(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ResourceError {
    /// Whether this error means the backing mount has gone away
    pub fn is_stale(&self) -> bool {
        matches!(self, ResourceError::StaleMount(_))
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;
